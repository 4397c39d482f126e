//! Stock Store: the authoritative quantity-on-hand per product.
//!
//! The store is the only path by which `quantity_on_hand` changes. Every mutation runs
//! inside a per-product unit of work ([`StockTransaction`]):
//!
//! ```text
//! begin(product)            lock exactly one product row (NotFound if absent/inactive)
//!   apply_delta / set_absolute   evaluated against the locked value, staged
//!   append_movement               history row staged in the same unit of work
//! commit()                  quantity, updated_at and history row become visible together
//! (drop without commit)     everything staged is discarded
//! ```
//!
//! Units of work on different products never share a lock.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use stockmaster_core::ProductId;
use stockmaster_inventory::{Movement, MovementDraft, ProductStock};

use crate::error::StoreError;
use crate::movement_log::MovementLog;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;

/// An open, exclusive unit of work on one product's stock pool.
#[async_trait]
pub trait StockTransaction: Send {
    /// Product as it was when the lock was taken.
    fn product(&self) -> &ProductStock;

    /// Quantity including staged changes.
    fn quantity(&self) -> i64;

    /// Stage `quantity + delta`.
    ///
    /// Fails with `InsufficientStock` (carrying the locked quantity) if the result
    /// would be below `minimum_result`; nothing is staged in that case.
    fn apply_delta(&mut self, delta: i64, minimum_result: i64) -> Result<i64, StoreError>;

    /// Stage an absolute quantity. `InvalidArgument` if negative.
    fn set_absolute(&mut self, quantity: i64) -> Result<i64, StoreError>;

    /// Stage the history row for this unit of work and assign its id.
    ///
    /// At most one movement per unit of work; `quantity_after` is the staged quantity.
    async fn append_movement(&mut self, draft: MovementDraft) -> Result<Movement, StoreError>;

    /// Make every staged change visible atomically.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait StockStore: Send + Sync {
    /// Lock one product's stock pool and open a unit of work on it.
    async fn begin(&self, product_id: ProductId) -> Result<Box<dyn StockTransaction>, StoreError>;

    /// Current committed quantity. `NotFound` if the product does not exist.
    async fn current_quantity(&self, product_id: ProductId) -> Result<i64, StoreError>;

    /// Atomically add `delta`; see [`StockTransaction::apply_delta`].
    async fn apply_delta(
        &self,
        product_id: ProductId,
        delta: i64,
        minimum_result: i64,
    ) -> Result<i64, StoreError> {
        let mut tx = self.begin(product_id).await?;
        let quantity = tx.apply_delta(delta, minimum_result)?;
        tx.commit().await?;
        Ok(quantity)
    }

    /// Atomically overwrite the stored quantity.
    async fn set_absolute(&self, product_id: ProductId, quantity: i64) -> Result<i64, StoreError> {
        if quantity < 0 {
            return Err(StoreError::InvalidArgument(
                "stock quantity cannot be negative".to_string(),
            ));
        }
        let mut tx = self.begin(product_id).await?;
        let quantity = tx.set_absolute(quantity)?;
        tx.commit().await?;
        Ok(quantity)
    }
}

#[async_trait]
impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    async fn begin(&self, product_id: ProductId) -> Result<Box<dyn StockTransaction>, StoreError> {
        (**self).begin(product_id).await
    }

    async fn current_quantity(&self, product_id: ProductId) -> Result<i64, StoreError> {
        (**self).current_quantity(product_id).await
    }

    async fn apply_delta(
        &self,
        product_id: ProductId,
        delta: i64,
        minimum_result: i64,
    ) -> Result<i64, StoreError> {
        (**self).apply_delta(product_id, delta, minimum_result).await
    }

    async fn set_absolute(&self, product_id: ProductId, quantity: i64) -> Result<i64, StoreError> {
        (**self).set_absolute(product_id, quantity).await
    }
}

/// Stock pools plus the history they are derived from, behind one backend.
pub trait LedgerStore: StockStore + MovementLog {}

impl<T> LedgerStore for T where T: StockStore + MovementLog + ?Sized {}

/// Shared staging rule for both backends.
pub(crate) fn stage_delta(current: i64, delta: i64, minimum_result: i64) -> Result<i64, StoreError> {
    stockmaster_inventory::checked_apply(current, delta, minimum_result).map_err(StoreError::from)
}

pub(crate) fn stage_absolute(quantity: i64) -> Result<i64, StoreError> {
    if quantity < 0 {
        return Err(StoreError::InvalidArgument(
            "stock quantity cannot be negative".to_string(),
        ));
    }
    Ok(quantity)
}

pub(crate) fn check_draft(
    product: &ProductStock,
    draft: &MovementDraft,
    already_recorded: bool,
) -> Result<(), StoreError> {
    if already_recorded {
        return Err(StoreError::InvalidArgument(
            "unit of work already recorded a movement".to_string(),
        ));
    }
    if draft.product_id != product.id {
        return Err(StoreError::InvalidArgument(format!(
            "movement targets product {}, unit of work holds {}",
            draft.product_id, product.id
        )));
    }
    Ok(())
}
