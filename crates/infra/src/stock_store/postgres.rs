//! Postgres-backed stock store, movement log and product directory.
//!
//! ## Locking
//!
//! `begin()` opens a transaction, sets a transaction-local `lock_timeout`, and takes
//! `SELECT ... FOR UPDATE` on exactly one `products` row. Every later read of the
//! quantity inside the unit of work sees the locked value, so concurrent units of work
//! on the same product serialize while different products proceed in parallel.
//!
//! The stock update and the `movements` insert run in that same transaction. Dropping
//! a [`StockTransaction`] without `commit()` rolls both back (SQLx rolls back on drop).
//!
//! ## Error Mapping
//!
//! See [`crate::error`]: `55P03` (lock not available) surfaces as `StoreError::Transient`,
//! the `quantity_on_hand >= 0` check as `InvalidArgument`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{instrument, Span};

use stockmaster_core::{MovementId, ProductId};
use stockmaster_inventory::{
    day_bounds, month_bounds, Movement, MovementDraft, MovementKind, MovementSummary, NewProduct,
    ProductStock,
};

use super::{check_draft, stage_absolute, stage_delta, StockStore, StockTransaction};
use crate::clock::{Clock, SystemClock};
use crate::directory::ProductDirectory;
use crate::error::{map_sqlx_error, StoreError};
use crate::movement_log::MovementLog;

/// `SUM(bigint)` is `numeric`; totals are clamped to `i64::MAX` before the cast so a
/// busy day saturates the same way the in-memory summary does.
const DAILY_SUMMARY_SQL: &str = r#"
    SELECT
        COUNT(*)::BIGINT AS movement_count,
        LEAST(COALESCE(SUM(quantity) FILTER (WHERE kind = 'inbound'), 0), 9223372036854775807)::BIGINT
            AS total_inbound_quantity,
        LEAST(COALESCE(SUM(quantity) FILTER (WHERE kind = 'outbound'), 0), 9223372036854775807)::BIGINT
            AS total_outbound_quantity,
        COUNT(*) FILTER (WHERE kind = 'adjustment')::BIGINT AS adjustment_count
    FROM movements
    WHERE occurred_at >= $1 AND occurred_at < $2
"#;

/// Postgres-backed inventory store.
///
/// `Send + Sync`; all access goes through the SQLx pool.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
    lock_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            lock_timeout: Duration::from_secs(5),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Open a transaction and lock one active product row.
    #[instrument(
        skip(self),
        fields(product_id = %product_id, lock_timeout_ms = self.lock_timeout.as_millis() as u64),
        err
    )]
    pub async fn lock_product(&self, product_id: ProductId) -> Result<PostgresTransaction, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // SET does not take bind parameters; the value is an integer we format ourselves.
        let set_timeout = format!(
            "SET LOCAL lock_timeout = {}",
            self.lock_timeout.as_millis().max(1)
        );
        sqlx::query(&set_timeout)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;

        let row = sqlx::query(
            r#"
            SELECT id, sku, name, quantity_on_hand, minimum_threshold, created_at, updated_at
            FROM products
            WHERE id = $1 AND active
            FOR UPDATE
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_product", e))?
        .ok_or(StoreError::NotFound)?;

        let snapshot: ProductStock = ProductRow::from_row(&row)
            .map_err(|e| decode_error("product", e))?
            .into();

        Ok(PostgresTransaction {
            staged_quantity: snapshot.quantity_on_hand,
            snapshot,
            tx,
            dirty: false,
            recorded: false,
            clock: self.clock.clone(),
        })
    }

    #[instrument(skip(self), fields(product_id = %product_id, movement_count = tracing::field::Empty), err)]
    pub async fn load_history(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, kind, quantity, reason, actor, occurred_at, quantity_after
            FROM movements
            WHERE product_id = $1
            ORDER BY occurred_at DESC, id DESC
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_history", e))?;

        let movements = decode_movements(rows)?;
        Span::current().record("movement_count", movements.len());
        Ok(movements)
    }

    #[instrument(skip(self), err)]
    pub async fn load_recent(&self, limit: usize) -> Result<Vec<Movement>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, kind, quantity, reason, actor, occurred_at, quantity_after
            FROM movements
            ORDER BY occurred_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_recent", e))?;

        decode_movements(rows)
    }

    #[instrument(skip(self), fields(movement_id = %id), err)]
    pub async fn load_movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, kind, quantity, reason, actor, occurred_at, quantity_after
            FROM movements
            WHERE id = $1
            "#,
        )
        .bind(id.value())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_movement", e))?;

        row.map(|r| {
            MovementRow::from_row(&r)
                .map_err(|e| decode_error("movement", e))
                .and_then(Movement::try_from)
        })
        .transpose()
    }

    #[instrument(skip(self), fields(date = %date), err)]
    pub async fn summarize_day(&self, date: NaiveDate) -> Result<MovementSummary, StoreError> {
        let (start, end) = day_bounds(date);
        let row = sqlx::query(DAILY_SUMMARY_SQL)
        .bind(start)
        .bind(end)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("daily_summary", e))?;

        let get = |column: &str| -> Result<i64, StoreError> {
            row.try_get::<i64, _>(column)
                .map_err(|e| decode_error("daily summary", e))
        };

        Ok(MovementSummary {
            date,
            movement_count: get("movement_count")?.max(0) as u64,
            total_inbound_quantity: get("total_inbound_quantity")?,
            total_outbound_quantity: get("total_outbound_quantity")?,
            adjustment_count: get("adjustment_count")?.max(0) as u64,
        })
    }

    #[instrument(skip(self), err)]
    pub async fn count_month(&self, year: i32, month: u32) -> Result<u64, StoreError> {
        let (start, end) = month_bounds(year, month)?;
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)::BIGINT
            FROM movements
            WHERE occurred_at >= $1 AND occurred_at < $2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("monthly_count", e))?;

        Ok(total.max(0) as u64)
    }

    #[instrument(skip(self, product), fields(sku = %product.sku), err)]
    pub async fn insert_product(&self, product: NewProduct) -> Result<ProductStock, StoreError> {
        let product = product.validate()?;
        let stock = product.into_stock(ProductId::new(), self.clock.now());

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, quantity_on_hand, minimum_threshold, active, created_at)
            VALUES ($1, $2, $3, $4, $5, TRUE, $6)
            "#,
        )
        .bind(stock.id.as_uuid())
        .bind(&stock.sku)
        .bind(&stock.name)
        .bind(stock.quantity_on_hand)
        .bind(stock.minimum_threshold)
        .bind(stock.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| match map_sqlx_error("register_product", e) {
            StoreError::Conflict(_) => {
                StoreError::Conflict(format!("sku '{}' already exists", stock.sku))
            }
            other => other,
        })?;

        Ok(stock)
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn fetch_product(&self, product_id: ProductId) -> Result<ProductStock, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, sku, name, quantity_on_hand, minimum_threshold, created_at, updated_at
            FROM products
            WHERE id = $1 AND active
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?
        .ok_or(StoreError::NotFound)?;

        Ok(ProductRow::from_row(&row)
            .map_err(|e| decode_error("product", e))?
            .into())
    }
}

/// Open unit of work holding the row lock on one product.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
    snapshot: ProductStock,
    staged_quantity: i64,
    /// Staged quantity not yet written to the row.
    dirty: bool,
    recorded: bool,
    clock: Arc<dyn Clock>,
}

impl PostgresTransaction {
    async fn write_quantity(&mut self, updated_at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE products
            SET quantity_on_hand = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(self.snapshot.id.as_uuid())
        .bind(self.staged_quantity)
        .bind(updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_quantity", e))?;
        self.dirty = false;
        Ok(())
    }
}

#[async_trait]
impl StockTransaction for PostgresTransaction {
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
        check_draft(&self.snapshot, &draft, self.recorded)?;

        // updated_at on the product matches the movement's timestamp.
        self.write_quantity(draft.occurred_at).await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO movements (product_id, kind, quantity, reason, actor, occurred_at, quantity_after)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(draft.product_id.as_uuid())
        .bind(draft.kind.as_str())
        .bind(draft.quantity)
        .bind(draft.reason.as_deref())
        .bind(&draft.actor)
        .bind(draft.occurred_at)
        .bind(self.staged_quantity)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;

        self.recorded = true;
        Ok(draft.into_movement(MovementId::new(id), self.staged_quantity))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = *self;
        if this.dirty {
            let now = this.clock.now();
            this.write_quantity(now).await?;
        }
        this.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

#[async_trait]
impl StockStore for PostgresInventoryStore {
    async fn begin(&self, product_id: ProductId) -> Result<Box<dyn StockTransaction>, StoreError> {
        Ok(Box::new(self.lock_product(product_id).await?))
    }

    async fn current_quantity(&self, product_id: ProductId) -> Result<i64, StoreError> {
        Ok(self.fetch_product(product_id).await?.quantity_on_hand)
    }
}

#[async_trait]
impl MovementLog for PostgresInventoryStore {
    async fn history(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError> {
        self.load_history(product_id).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Movement>, StoreError> {
        self.load_recent(limit).await
    }

    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        self.load_movement(id).await
    }

    async fn daily_summary(&self, date: NaiveDate) -> Result<MovementSummary, StoreError> {
        self.summarize_day(date).await
    }

    async fn monthly_count(&self, year: i32, month: u32) -> Result<u64, StoreError> {
        self.count_month(year, month).await
    }
}

#[async_trait]
impl ProductDirectory for PostgresInventoryStore {
    async fn product_exists(&self, product_id: ProductId) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM products WHERE id = $1 AND active)",
        )
        .bind(product_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("product_exists", e))?;
        Ok(exists)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<ProductStock, StoreError> {
        self.fetch_product(product_id).await
    }

    async fn register_product(&self, product: NewProduct) -> Result<ProductStock, StoreError> {
        self.insert_product(product).await
    }

    async fn deactivate_product(&self, product_id: ProductId) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE products SET active = FALSE WHERE id = $1 AND active")
            .bind(product_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("deactivate_product", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn low_stock_products(&self) -> Result<Vec<ProductStock>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, sku, name, quantity_on_hand, minimum_threshold, created_at, updated_at
            FROM products
            WHERE active AND quantity_on_hand <= minimum_threshold
            ORDER BY quantity_on_hand ASC, sku ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("low_stock_products", e))?;

        rows.iter()
            .map(|r| {
                ProductRow::from_row(r)
                    .map(ProductStock::from)
                    .map_err(|e| decode_error("product", e))
            })
            .collect()
    }
}

fn decode_error(what: &str, err: sqlx::Error) -> StoreError {
    StoreError::Persistence(format!("failed to decode {what} row: {err}"))
}

fn decode_movements(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<Movement>, StoreError> {
    rows.iter()
        .map(|r| {
            MovementRow::from_row(r)
                .map_err(|e| decode_error("movement", e))
                .and_then(Movement::try_from)
        })
        .collect()
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: uuid::Uuid,
    sku: String,
    name: String,
    quantity_on_hand: i64,
    minimum_threshold: i64,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ProductRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            sku: row.try_get("sku")?,
            name: row.try_get("name")?,
            quantity_on_hand: row.try_get("quantity_on_hand")?,
            minimum_threshold: row.try_get("minimum_threshold")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<ProductRow> for ProductStock {
    fn from(row: ProductRow) -> Self {
        ProductStock {
            id: ProductId::from_uuid(row.id),
            sku: row.sku,
            name: row.name,
            quantity_on_hand: row.quantity_on_hand,
            minimum_threshold: row.minimum_threshold,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug)]
struct MovementRow {
    id: i64,
    product_id: uuid::Uuid,
    kind: String,
    quantity: i64,
    reason: Option<String>,
    actor: String,
    occurred_at: DateTime<Utc>,
    quantity_after: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for MovementRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            kind: row.try_get("kind")?,
            quantity: row.try_get("quantity")?,
            reason: row.try_get("reason")?,
            actor: row.try_get("actor")?,
            occurred_at: row.try_get("occurred_at")?,
            quantity_after: row.try_get("quantity_after")?,
        })
    }
}

impl TryFrom<MovementRow> for Movement {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let kind: MovementKind = row.kind.parse().map_err(|_| {
            StoreError::Persistence(format!("unknown movement kind '{}' in row {}", row.kind, row.id))
        })?;

        Ok(Movement {
            id: MovementId::new(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            kind,
            quantity: row.quantity,
            reason: row.reason,
            actor: row.actor,
            occurred_at: row.occurred_at,
            quantity_after: row.quantity_after,
        })
    }
}
