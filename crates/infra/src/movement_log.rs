//! Read side of the append-only movement ledger.
//!
//! Writes only happen through `StockTransaction::append_movement`, inside the same
//! unit of work as the stock mutation. Everything here is a pure read.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use stockmaster_core::{MovementId, ProductId};
use stockmaster_inventory::{Movement, MovementSummary};

use crate::error::StoreError;

#[async_trait]
pub trait MovementLog: Send + Sync {
    /// All movements for a product, newest first.
    async fn history(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError>;

    /// Newest-first movements across all products, at most `limit`.
    async fn recent(&self, limit: usize) -> Result<Vec<Movement>, StoreError>;

    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError>;

    /// Totals over movements whose `occurred_at` falls on `date` (UTC).
    async fn daily_summary(&self, date: NaiveDate) -> Result<MovementSummary, StoreError>;

    /// Number of movements in a UTC calendar month.
    async fn monthly_count(&self, year: i32, month: u32) -> Result<u64, StoreError>;
}

#[async_trait]
impl<L> MovementLog for Arc<L>
where
    L: MovementLog + ?Sized,
{
    async fn history(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError> {
        (**self).history(product_id).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Movement>, StoreError> {
        (**self).recent(limit).await
    }

    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        (**self).movement(id).await
    }

    async fn daily_summary(&self, date: NaiveDate) -> Result<MovementSummary, StoreError> {
        (**self).daily_summary(date).await
    }

    async fn monthly_count(&self, year: i32, month: u32) -> Result<u64, StoreError> {
        (**self).monthly_count(year, month).await
    }
}
