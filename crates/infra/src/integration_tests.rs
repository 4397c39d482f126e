//! Integration tests for the full ledger pipeline.
//!
//! Tests: MovementRequest → MovementLedger → StockStore unit of work → MovementLog
//!
//! Verifies:
//! - The worked example (15 → 25 → rejected → 0) end to end
//! - Concurrent outbound movements never oversell
//! - A failure while recording rolls back the stock change
//! - Rejected and soft-deleted paths leave no trace in history

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};

    use stockmaster_core::{MovementId, ProductId};
    use stockmaster_inventory::{
        Movement, MovementDraft, MovementKind, MovementRequest, MovementSummary, NewProduct,
        ProductStock,
    };

    use crate::clock::FixedClock;
    use crate::config::LedgerConfig;
    use crate::directory::ProductDirectory;
    use crate::error::StoreError;
    use crate::ledger::{LedgerError, MovementLedger};
    use crate::movement_log::MovementLog;
    use crate::stock_store::{InMemoryInventoryStore, StockStore, StockTransaction};

    fn setup() -> (
        MovementLedger<Arc<InMemoryInventoryStore>, Arc<InMemoryInventoryStore>>,
        Arc<InMemoryInventoryStore>,
    ) {
        let store = Arc::new(InMemoryInventoryStore::new());
        let ledger = MovementLedger::new(store.clone(), store.clone(), LedgerConfig::default());
        (ledger, store)
    }

    async fn register(directory: &impl ProductDirectory, sku: &str, quantity: i64) -> ProductId {
        directory
            .register_product(NewProduct {
                sku: sku.to_string(),
                name: format!("Item {sku}"),
                initial_quantity: quantity,
                minimum_threshold: 0,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn inbound_outbound_adjustment_scenario() {
        let (ledger, store) = setup();
        let p = register(&*store, "SCN-1", 15).await;

        let inbound = ledger
            .submit_movement(MovementRequest::new(p, MovementKind::Inbound, 10))
            .await
            .unwrap();
        assert_eq!(inbound.quantity_on_hand, 25);

        let rejected = ledger
            .submit_movement(MovementRequest::new(p, MovementKind::Outbound, 30))
            .await
            .unwrap_err();
        assert_eq!(
            rejected,
            LedgerError::InsufficientStock {
                available: 25,
                requested: 30
            }
        );
        assert_eq!(store.current_quantity(p).await.unwrap(), 25);

        let adjusted = ledger
            .submit_movement(MovementRequest::new(p, MovementKind::Adjustment, 0))
            .await
            .unwrap();
        assert_eq!(adjusted.quantity_on_hand, 0);
        assert_eq!(store.current_quantity(p).await.unwrap(), 0);

        let kinds: Vec<_> = ledger
            .history(p)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.kind)
            .collect();
        assert_eq!(kinds, vec![MovementKind::Adjustment, MovementKind::Inbound]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_outbound_never_oversells() {
        let (ledger, store) = setup();
        let ledger = Arc::new(ledger);
        let p = register(&*store, "HOT-1", 50).await;

        let mut handles = Vec::with_capacity(100);
        for _ in 0..100 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .submit_movement(MovementRequest::new(p, MovementKind::Outbound, 1))
                    .await
            }));
        }

        let mut accepted = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(LedgerError::InsufficientStock { available, requested }) => {
                    assert_eq!(available, 0);
                    assert_eq!(requested, 1);
                    insufficient += 1;
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(accepted, 50);
        assert_eq!(insufficient, 50);
        assert_eq!(store.current_quantity(p).await.unwrap(), 0);

        let history = ledger.history(p).await.unwrap();
        assert_eq!(history.len(), 50);
        let mut after: Vec<_> = history.iter().map(|m| m.quantity_after).collect();
        after.sort_unstable();
        assert_eq!(after, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn different_products_progress_independently() {
        let (ledger, store) = setup();
        let ledger = Arc::new(ledger);
        let a = register(&*store, "A", 0).await;
        let b = register(&*store, "B", 0).await;

        let mut handles = Vec::new();
        for i in 0..40 {
            let ledger = ledger.clone();
            let product = if i % 2 == 0 { a } else { b };
            handles.push(tokio::spawn(async move {
                ledger
                    .submit_movement(MovementRequest::new(product, MovementKind::Inbound, 2))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.current_quantity(a).await.unwrap(), 40);
        assert_eq!(store.current_quantity(b).await.unwrap(), 40);
        assert_eq!(ledger.recent_history(100).await.unwrap().len(), 40);
    }

    #[tokio::test]
    async fn rejected_submissions_leave_no_trace() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 1, 15, 8, 0, 0).unwrap(),
        ));
        let store = Arc::new(InMemoryInventoryStore::new().with_clock(clock.clone()));
        let ledger = MovementLedger::new(store.clone(), store.clone(), LedgerConfig::default())
            .with_clock(clock);
        let p = register(&*store, "R-1", 2).await;

        let _ = ledger
            .submit_movement(MovementRequest::new(p, MovementKind::Outbound, 3))
            .await
            .unwrap_err();
        let _ = ledger
            .submit_movement(MovementRequest::new(p, MovementKind::Inbound, 0))
            .await
            .unwrap_err();
        let _ = ledger
            .submit_movement(MovementRequest::new(ProductId::new(), MovementKind::Inbound, 1))
            .await
            .unwrap_err();

        assert!(ledger.history(p).await.unwrap().is_empty());
        assert!(ledger.recent_history(10).await.unwrap().is_empty());
        let summary = ledger
            .daily_summary(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap())
            .await
            .unwrap();
        assert_eq!(summary, MovementSummary::empty(summary.date));
    }

    #[tokio::test]
    async fn soft_deleted_product_rejects_movements() {
        let (ledger, store) = setup();
        let p = register(&*store, "DEL-1", 10).await;
        ledger
            .submit_movement(MovementRequest::new(p, MovementKind::Outbound, 1))
            .await
            .unwrap();

        store.deactivate_product(p).await.unwrap();

        let err = ledger
            .submit_movement(MovementRequest::new(p, MovementKind::Inbound, 1))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::NotFound);
        // history of the deleted product is kept
        assert_eq!(ledger.history(p).await.unwrap().len(), 1);
    }

    /// Store whose units of work fail while recording the movement.
    #[derive(Debug)]
    struct FailingRecordStore {
        inner: Arc<InMemoryInventoryStore>,
    }

    struct FailingRecordTransaction {
        inner: Box<dyn StockTransaction>,
    }

    #[async_trait]
    impl StockTransaction for FailingRecordTransaction {
        fn product(&self) -> &ProductStock {
            self.inner.product()
        }

        fn quantity(&self) -> i64 {
            self.inner.quantity()
        }

        fn apply_delta(&mut self, delta: i64, minimum_result: i64) -> Result<i64, StoreError> {
            self.inner.apply_delta(delta, minimum_result)
        }

        fn set_absolute(&mut self, quantity: i64) -> Result<i64, StoreError> {
            self.inner.set_absolute(quantity)
        }

        async fn append_movement(&mut self, _draft: MovementDraft) -> Result<Movement, StoreError> {
            Err(StoreError::Persistence("disk full".to_string()))
        }

        async fn commit(self: Box<Self>) -> Result<(), StoreError> {
            self.inner.commit().await
        }
    }

    #[async_trait]
    impl StockStore for FailingRecordStore {
        async fn begin(
            &self,
            product_id: ProductId,
        ) -> Result<Box<dyn StockTransaction>, StoreError> {
            let inner = self.inner.begin(product_id).await?;
            Ok(Box::new(FailingRecordTransaction { inner }))
        }

        async fn current_quantity(&self, product_id: ProductId) -> Result<i64, StoreError> {
            self.inner.current_quantity(product_id).await
        }
    }

    #[async_trait]
    impl MovementLog for FailingRecordStore {
        async fn history(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError> {
            self.inner.history(product_id).await
        }

        async fn recent(&self, limit: usize) -> Result<Vec<Movement>, StoreError> {
            self.inner.recent(limit).await
        }

        async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
            self.inner.movement(id).await
        }

        async fn daily_summary(&self, date: NaiveDate) -> Result<MovementSummary, StoreError> {
            self.inner.daily_summary(date).await
        }

        async fn monthly_count(&self, year: i32, month: u32) -> Result<u64, StoreError> {
            self.inner.monthly_count(year, month).await
        }
    }

    #[tokio::test]
    async fn recording_failure_rolls_back_stock_change() {
        let inner = Arc::new(InMemoryInventoryStore::new());
        let p = register(&*inner, "RB-1", 10).await;
        let ledger = MovementLedger::new(
            FailingRecordStore {
                inner: inner.clone(),
            },
            inner.clone(),
            LedgerConfig::default(),
        );

        let err = ledger
            .submit_movement(MovementRequest::new(p, MovementKind::Outbound, 4))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Persistence(_)));
        assert!(!err.is_retryable());
        assert_eq!(inner.current_quantity(p).await.unwrap(), 10);
        assert!(inner.history(p).await.unwrap().is_empty());

        // the lock was released with the rolled-back unit of work
        assert_eq!(inner.apply_delta(p, 1, 0).await.unwrap(), 11);
    }
}
