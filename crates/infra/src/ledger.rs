//! Movement ledger: the single entry point that changes stock.
//!
//! ```text
//! MovementRequest
//!   ↓
//! 1. Plan (pure): validate kind/quantity/reason/actor, resolve the stock effect
//!   ↓
//! 2. Directory: product must exist and be active
//!   ↓
//! 3. Begin: lock the product's stock pool
//!   ↓
//! 4. Apply: delta (no-negative-stock rule) or absolute adjustment, on the locked value
//!   ↓
//! 5. Record: stage the history row (UTC timestamp, resolved actor)
//!   ↓
//! 6. Commit: stock and history become visible together
//! ```
//!
//! Any failure before step 6 drops the unit of work, which discards the staged stock
//! change as well. The ledger never retries; `LedgerError::is_retryable` tells the
//! caller whether retrying can help.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use stockmaster_core::{DomainError, MovementId, ProductId};
use stockmaster_inventory::{Movement, MovementRequest, MovementSummary, StockEffect};

use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::directory::ProductDirectory;
use crate::error::StoreError;
use crate::movement_log::MovementLog;
use crate::stock_store::StockStore;

/// Caller-facing failure of a ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i64, requested: i64 },

    /// Lock contention or a storage timeout. Nothing was applied.
    #[error("transient storage failure: {0}")]
    TransientStorage(String),

    /// Unexpected storage failure. The unit of work was rolled back.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::TransientStorage(_))
    }

    fn outcome(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation_error",
            LedgerError::NotFound => "not_found",
            LedgerError::InsufficientStock { .. } => "insufficient_stock",
            LedgerError::TransientStorage(_) => "transient_storage",
            LedgerError::Persistence(_) => "persistence_failure",
        }
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                LedgerError::Validation(msg)
            }
            DomainError::Conflict(msg) => LedgerError::Validation(msg),
            DomainError::NotFound => LedgerError::NotFound,
            DomainError::InsufficientStock {
                available,
                requested,
            } => LedgerError::InsufficientStock {
                available,
                requested,
            },
        }
    }
}

/// `InsufficientStock` from the store does not know the requested amount; the ledger
/// fills it in where it has it (see `submit_movement`).
impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => LedgerError::NotFound,
            StoreError::InsufficientStock { available } => LedgerError::InsufficientStock {
                available,
                requested: 0,
            },
            StoreError::InvalidArgument(msg) | StoreError::Conflict(msg) => {
                LedgerError::Validation(msg)
            }
            StoreError::Transient(msg) => LedgerError::TransientStorage(msg),
            StoreError::Persistence(msg) => LedgerError::Persistence(msg),
        }
    }
}

/// Result of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedMovement {
    pub movement: Movement,
    pub quantity_on_hand: i64,
}

/// Generic over the stock store `S` and product directory `D` so tests run against
/// in-memory backends and the API against either.
#[derive(Debug)]
pub struct MovementLedger<S, D> {
    store: S,
    directory: D,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl<S, D> MovementLedger<S, D> {
    pub fn new(store: S, directory: D, config: LedgerConfig) -> Self {
        Self {
            store,
            directory,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Current UTC calendar day according to the ledger's clock.
    pub fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }
}

impl<S, D> MovementLedger<S, D>
where
    S: StockStore + MovementLog,
    D: ProductDirectory,
{
    /// Validate, apply and record one movement as a single unit of work.
    #[instrument(
        skip(self, request),
        fields(
            product_id = %request.product_id,
            kind = %request.kind,
            quantity = request.quantity
        )
    )]
    pub async fn submit_movement(
        &self,
        request: MovementRequest,
    ) -> Result<AcceptedMovement, LedgerError> {
        let product_id = request.product_id;
        let kind = request.kind;
        let quantity = request.quantity;

        match self.apply_and_record(request).await {
            Ok(accepted) => {
                info!(
                    %product_id,
                    %kind,
                    quantity,
                    movement_id = %accepted.movement.id,
                    quantity_on_hand = accepted.quantity_on_hand,
                    outcome = "accepted",
                    "movement accepted"
                );
                Ok(accepted)
            }
            Err(err) => {
                warn!(
                    %product_id,
                    %kind,
                    quantity,
                    outcome = err.outcome(),
                    error = %err,
                    "movement rejected"
                );
                Err(err)
            }
        }
    }

    async fn apply_and_record(
        &self,
        request: MovementRequest,
    ) -> Result<AcceptedMovement, LedgerError> {
        let plan = request.plan(&self.config.system_actor)?;

        if !self.directory.product_exists(plan.product_id).await? {
            return Err(LedgerError::NotFound);
        }

        let mut tx = self.store.begin(plan.product_id).await?;

        let quantity_on_hand = match plan.effect {
            StockEffect::Delta(delta) => tx.apply_delta(delta, 0).map_err(|e| match e {
                StoreError::InsufficientStock { available } => LedgerError::InsufficientStock {
                    available,
                    requested: plan.quantity,
                },
                other => other.into(),
            })?,
            StockEffect::SetTo(target) => tx.set_absolute(target)?,
        };
        let minimum_threshold = tx.product().minimum_threshold;
        let sku = tx.product().sku.clone();

        let movement = tx.append_movement(plan.into_draft(self.clock.now())).await?;
        tx.commit().await?;

        if quantity_on_hand <= minimum_threshold {
            warn!(
                product_id = %movement.product_id,
                %sku,
                quantity_on_hand,
                minimum_threshold,
                "product at or below minimum stock threshold"
            );
        }

        Ok(AcceptedMovement {
            movement,
            quantity_on_hand,
        })
    }

    /// All accepted movements for a product, newest first. Unknown products have an
    /// empty history.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn history(&self, product_id: ProductId) -> Result<Vec<Movement>, LedgerError> {
        Ok(self.store.history(product_id).await?)
    }

    /// Newest movements across all products. `limit` is clamped to
    /// `[1, max_recent_limit]`.
    #[instrument(skip(self), err)]
    pub async fn recent_history(&self, limit: usize) -> Result<Vec<Movement>, LedgerError> {
        let limit = limit.clamp(1, self.config.max_recent_limit.max(1));
        Ok(self.store.recent(limit).await?)
    }

    #[instrument(skip(self), err)]
    pub async fn daily_summary(&self, date: NaiveDate) -> Result<MovementSummary, LedgerError> {
        Ok(self.store.daily_summary(date).await?)
    }

    #[instrument(skip(self), fields(movement_id = %id), err)]
    pub async fn movement(&self, id: MovementId) -> Result<Movement, LedgerError> {
        self.store.movement(id).await?.ok_or(LedgerError::NotFound)
    }

    #[instrument(skip(self), err)]
    pub async fn monthly_movement_count(&self, year: i32, month: u32) -> Result<u64, LedgerError> {
        Ok(self.store.monthly_count(year, month).await?)
    }
}
