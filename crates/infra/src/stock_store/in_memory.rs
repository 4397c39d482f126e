use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stockmaster_core::{find_by_id, DomainError, MovementId, ProductId};
use stockmaster_inventory::{
    month_bounds, newest_first, Movement, MovementDraft, MovementSummary, NewProduct, ProductStock,
};

use super::{check_draft, stage_absolute, stage_delta, StockStore, StockTransaction};
use crate::clock::{Clock, SystemClock};
use crate::directory::ProductDirectory;
use crate::error::StoreError;
use crate::movement_log::MovementLog;

#[derive(Debug)]
struct ProductRow {
    stock: ProductStock,
    active: bool,
}

#[derive(Debug, Default)]
struct Catalog {
    rows: HashMap<ProductId, Arc<Mutex<ProductRow>>>,
    skus: HashMap<String, ProductId>,
}

/// In-memory product directory, stock store and movement log.
///
/// Intended for tests/dev. Each product row sits behind its own async mutex, which is
/// the per-product serialization point; the catalog map and the movement log are only
/// locked for short, non-async sections.
#[derive(Debug)]
pub struct InMemoryInventoryStore {
    catalog: RwLock<Catalog>,
    movements: Arc<RwLock<Vec<Movement>>>,
    next_movement_id: Arc<AtomicI64>,
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
}

impl Default for InMemoryInventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(Catalog::default()),
            movements: Arc::new(RwLock::new(Vec::new())),
            next_movement_id: Arc::new(AtomicI64::new(0)),
            clock: Arc::new(SystemClock),
            lock_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    fn row(&self, product_id: ProductId) -> Result<Arc<Mutex<ProductRow>>, StoreError> {
        let catalog = self
            .catalog
            .read()
            .map_err(|_| StoreError::Persistence("lock poisoned".to_string()))?;
        catalog
            .rows
            .get(&product_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn lock_row(
        &self,
        product_id: ProductId,
    ) -> Result<OwnedMutexGuard<ProductRow>, StoreError> {
        let row = self.row(product_id)?;
        let guard = tokio::time::timeout(self.lock_timeout, row.lock_owned())
            .await
            .map_err(|_| {
                StoreError::Transient(format!(
                    "timed out after {:?} waiting for product {product_id}",
                    self.lock_timeout
                ))
            })?;

        if !guard.active {
            return Err(StoreError::NotFound);
        }
        Ok(guard)
    }

    fn read_movements<T>(&self, f: impl FnOnce(&[Movement]) -> T) -> Result<T, StoreError> {
        let log = self
            .movements
            .read()
            .map_err(|_| StoreError::Persistence("lock poisoned".to_string()))?;
        Ok(f(&log))
    }
}

struct InMemoryTransaction {
    row: OwnedMutexGuard<ProductRow>,
    snapshot: ProductStock,
    staged_quantity: i64,
    dirty: bool,
    staged_movement: Option<Movement>,
    movements: Arc<RwLock<Vec<Movement>>>,
    next_movement_id: Arc<AtomicI64>,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl StockTransaction for InMemoryTransaction {
    fn product(&self) -> &ProductStock {
        &self.snapshot
    }

    fn quantity(&self) -> i64 {
        self.staged_quantity
    }

    fn apply_delta(&mut self, delta: i64, minimum_result: i64) -> Result<i64, StoreError> {
        self.staged_quantity = stage_delta(self.staged_quantity, delta, minimum_result)?;
        self.dirty = true;
        Ok(self.staged_quantity)
    }

    fn set_absolute(&mut self, quantity: i64) -> Result<i64, StoreError> {
        self.staged_quantity = stage_absolute(quantity)?;
        self.dirty = true;
        Ok(self.staged_quantity)
    }

    async fn append_movement(&mut self, draft: MovementDraft) -> Result<Movement, StoreError> {
        check_draft(&self.snapshot, &draft, self.staged_movement.is_some())?;

        let id = self.next_movement_id.fetch_add(1, Ordering::SeqCst) + 1;
        let movement = draft.into_movement(MovementId::new(id), self.staged_quantity);
        self.staged_movement = Some(movement.clone());
        Ok(movement)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = *self;

        let updated_at = match this.staged_movement.take() {
            Some(movement) => {
                let occurred_at = movement.occurred_at;
                let mut log = this
                    .movements
                    .write()
                    .map_err(|_| StoreError::Persistence("lock poisoned".to_string()))?;
                log.push(movement);
                Some(occurred_at)
            }
            None if this.dirty => Some(this.clock.now()),
            None => None,
        };

        if let Some(at) = updated_at {
            this.row.stock.quantity_on_hand = this.staged_quantity;
            this.row.stock.updated_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl StockStore for InMemoryInventoryStore {
    async fn begin(&self, product_id: ProductId) -> Result<Box<dyn StockTransaction>, StoreError> {
        let row = self.lock_row(product_id).await?;
        let snapshot = row.stock.clone();
        Ok(Box::new(InMemoryTransaction {
            staged_quantity: snapshot.quantity_on_hand,
            snapshot,
            row,
            dirty: false,
            staged_movement: None,
            movements: self.movements.clone(),
            next_movement_id: self.next_movement_id.clone(),
            clock: self.clock.clone(),
        }))
    }

    async fn current_quantity(&self, product_id: ProductId) -> Result<i64, StoreError> {
        let row = self.lock_row(product_id).await?;
        Ok(row.stock.quantity_on_hand)
    }
}

#[async_trait]
impl MovementLog for InMemoryInventoryStore {
    async fn history(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError> {
        self.read_movements(|log| {
            let mut out: Vec<Movement> = log
                .iter()
                .filter(|m| m.product_id == product_id)
                .cloned()
                .collect();
            out.sort_by(newest_first);
            out
        })
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Movement>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.read_movements(|log| {
            // Partition by reference so only the newest `limit` rows are sorted and cloned.
            let mut refs: Vec<&Movement> = log.iter().collect();
            if refs.len() > limit {
                refs.select_nth_unstable_by(limit - 1, |a, b| newest_first(a, b));
                refs.truncate(limit);
            }
            refs.sort_by(|a, b| newest_first(a, b));
            refs.into_iter().cloned().collect()
        })
    }

    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        self.read_movements(|log| find_by_id(log, &id).cloned())
    }

    async fn daily_summary(&self, date: NaiveDate) -> Result<MovementSummary, StoreError> {
        self.read_movements(|log| MovementSummary::from_movements(date, log))
    }

    async fn monthly_count(&self, year: i32, month: u32) -> Result<u64, StoreError> {
        let (start, end) = month_bounds(year, month)?;
        self.read_movements(|log| {
            log.iter()
                .filter(|m| m.occurred_at >= start && m.occurred_at < end)
                .count() as u64
        })
    }
}

#[async_trait]
impl ProductDirectory for InMemoryInventoryStore {
    async fn product_exists(&self, product_id: ProductId) -> Result<bool, StoreError> {
        match self.lock_row(product_id).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_product(&self, product_id: ProductId) -> Result<ProductStock, StoreError> {
        let row = self.lock_row(product_id).await?;
        Ok(row.stock.clone())
    }

    async fn register_product(&self, product: NewProduct) -> Result<ProductStock, StoreError> {
        let product = product.validate()?;
        let mut catalog = self
            .catalog
            .write()
            .map_err(|_| StoreError::Persistence("lock poisoned".to_string()))?;

        if catalog.skus.contains_key(&product.sku) {
            return Err(DomainError::conflict(format!("sku '{}' already exists", product.sku)).into());
        }

        let id = ProductId::new();
        let stock = product.into_stock(id, self.clock.now());
        catalog.skus.insert(stock.sku.clone(), id);
        catalog.rows.insert(
            id,
            Arc::new(Mutex::new(ProductRow {
                stock: stock.clone(),
                active: true,
            })),
        );
        Ok(stock)
    }

    async fn deactivate_product(&self, product_id: ProductId) -> Result<(), StoreError> {
        let mut row = self.lock_row(product_id).await?;
        row.active = false;
        Ok(())
    }

    async fn low_stock_products(&self) -> Result<Vec<ProductStock>, StoreError> {
        let rows: Vec<_> = {
            let catalog = self
                .catalog
                .read()
                .map_err(|_| StoreError::Persistence("lock poisoned".to_string()))?;
            catalog.rows.values().cloned().collect()
        };

        let mut out = Vec::new();
        for row in rows {
            let row = row.lock().await;
            if row.active && row.stock.is_low_stock() {
                out.push(row.stock.clone());
            }
        }
        out.sort_by(|a, b| {
            a.quantity_on_hand
                .cmp(&b.quantity_on_hand)
                .then_with(|| a.sku.cmp(&b.sku))
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockmaster_inventory::MovementKind;

    fn new_product(sku: &str, quantity: i64) -> NewProduct {
        NewProduct {
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            initial_quantity: quantity,
            minimum_threshold: 5,
        }
    }

    fn draft(product_id: ProductId, kind: MovementKind, quantity: i64) -> MovementDraft {
        MovementDraft {
            product_id,
            kind,
            quantity,
            reason: None,
            actor: "system".to_string(),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let store = InMemoryInventoryStore::new();
        let err = store.current_quantity(ProductId::new()).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound);
        assert!(matches!(store.begin(ProductId::new()).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn apply_delta_commits_and_rejects_without_partial_apply() {
        let store = InMemoryInventoryStore::new();
        let p = store.register_product(new_product("SKU-1", 10)).await.unwrap();

        assert_eq!(store.apply_delta(p.id, -4, 0).await.unwrap(), 6);

        let err = store.apply_delta(p.id, -7, 0).await.unwrap_err();
        assert_eq!(err, StoreError::InsufficientStock { available: 6 });
        assert_eq!(store.current_quantity(p.id).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn set_absolute_rejects_negative() {
        let store = InMemoryInventoryStore::new();
        let p = store.register_product(new_product("SKU-1", 10)).await.unwrap();

        assert_eq!(store.set_absolute(p.id, 3).await.unwrap(), 3);
        assert!(matches!(
            store.set_absolute(p.id, -1).await,
            Err(StoreError::InvalidArgument(_))
        ));
        assert_eq!(store.current_quantity(p.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back_everything() {
        let store = InMemoryInventoryStore::new();
        let p = store.register_product(new_product("SKU-1", 10)).await.unwrap();

        {
            let mut tx = store.begin(p.id).await.unwrap();
            tx.apply_delta(5, 0).unwrap();
            tx.append_movement(draft(p.id, MovementKind::Inbound, 5))
                .await
                .unwrap();
            // dropped without commit
        }

        assert_eq!(store.current_quantity(p.id).await.unwrap(), 10);
        assert!(store.history(p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_publishes_quantity_and_movement_together() {
        let store = InMemoryInventoryStore::new();
        let p = store.register_product(new_product("SKU-1", 10)).await.unwrap();

        let mut tx = store.begin(p.id).await.unwrap();
        tx.apply_delta(-3, 0).unwrap();
        let m = tx
            .append_movement(draft(p.id, MovementKind::Outbound, 3))
            .await
            .unwrap();
        assert_eq!(m.quantity_after, 7);
        tx.commit().await.unwrap();

        assert_eq!(store.current_quantity(p.id).await.unwrap(), 7);
        assert_eq!(store.history(p.id).await.unwrap(), vec![m.clone()]);
        let product = store.get_product(p.id).await.unwrap();
        assert_eq!(product.updated_at, Some(m.occurred_at));
    }

    #[tokio::test]
    async fn second_movement_in_one_unit_of_work_is_rejected() {
        let store = InMemoryInventoryStore::new();
        let p = store.register_product(new_product("SKU-1", 10)).await.unwrap();

        let mut tx = store.begin(p.id).await.unwrap();
        tx.append_movement(draft(p.id, MovementKind::Adjustment, 10))
            .await
            .unwrap();
        let err = tx
            .append_movement(draft(p.id, MovementKind::Adjustment, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn lock_wait_times_out_as_transient() {
        let store = InMemoryInventoryStore::new().with_lock_timeout(Duration::from_millis(20));
        let p = store.register_product(new_product("SKU-1", 10)).await.unwrap();

        let _held = store.begin(p.id).await.unwrap();
        let err = store.apply_delta(p.id, 1, 0).await.unwrap_err();
        assert!(err.is_transient(), "{err:?}");
    }

    #[tokio::test]
    async fn other_products_are_not_blocked_by_a_held_lock() {
        let store = InMemoryInventoryStore::new().with_lock_timeout(Duration::from_millis(20));
        let a = store.register_product(new_product("SKU-A", 10)).await.unwrap();
        let b = store.register_product(new_product("SKU-B", 10)).await.unwrap();

        let _held = store.begin(a.id).await.unwrap();
        assert_eq!(store.apply_delta(b.id, 1, 0).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn duplicate_sku_is_a_conflict_even_after_deactivation() {
        let store = InMemoryInventoryStore::new();
        let p = store.register_product(new_product("SKU-1", 1)).await.unwrap();
        store.deactivate_product(p.id).await.unwrap();

        let err = store.register_product(new_product("SKU-1", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn deactivated_products_disappear_from_the_ledger_view() {
        let store = InMemoryInventoryStore::new();
        let p = store.register_product(new_product("SKU-1", 1)).await.unwrap();
        store.deactivate_product(p.id).await.unwrap();

        assert!(!store.product_exists(p.id).await.unwrap());
        assert!(matches!(store.begin(p.id).await, Err(StoreError::NotFound)));
        assert!(store.low_stock_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_keeps_the_newest_rows_regardless_of_commit_order() {
        let store = InMemoryInventoryStore::new();
        let p = store.register_product(new_product("SKU-1", 0)).await.unwrap();
        let base = Utc::now();

        for offset in [2, 0, 5, 1, 3] {
            let mut tx = store.begin(p.id).await.unwrap();
            tx.apply_delta(1, 0).unwrap();
            let mut d = draft(p.id, MovementKind::Inbound, 1);
            d.occurred_at = base + chrono::Duration::seconds(offset);
            tx.append_movement(d).await.unwrap();
            tx.commit().await.unwrap();
        }

        let times: Vec<_> = store
            .recent(3)
            .await
            .unwrap()
            .into_iter()
            .map(|m| (m.occurred_at - base).num_seconds())
            .collect();
        assert_eq!(times, vec![5, 3, 2]);
        assert_eq!(store.recent(10).await.unwrap().len(), 5);
        assert!(store.recent(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn low_stock_lists_lowest_quantity_first() {
        let store = InMemoryInventoryStore::new();
        store.register_product(new_product("SKU-A", 5)).await.unwrap();
        store.register_product(new_product("SKU-B", 0)).await.unwrap();
        store.register_product(new_product("SKU-C", 50)).await.unwrap();

        let skus: Vec<_> = store
            .low_stock_products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.sku)
            .collect();
        assert_eq!(skus, vec!["SKU-B".to_string(), "SKU-A".to_string()]);
    }
}
