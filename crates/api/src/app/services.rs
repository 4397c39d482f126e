//! Backend wiring: `DATABASE_URL` selects Postgres, otherwise everything is in memory.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use stockmaster_infra::{
    db, AppConfig, Clock, InMemoryInventoryStore, LedgerConfig, LedgerStore, MovementLedger,
    PostgresInventoryStore, ProductDirectory, SystemClock,
};

/// Ledger over type-erased backends so both wirings share one handler set.
pub type AppLedger = MovementLedger<Arc<dyn LedgerStore>, Arc<dyn ProductDirectory>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    InMemory,
    Postgres,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::InMemory => "in_memory",
            Backend::Postgres => "postgres",
        }
    }
}

pub struct AppServices {
    ledger: AppLedger,
    backend: Backend,
}

impl AppServices {
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::in_memory_with_clock(config, Arc::new(SystemClock))
    }

    /// In-memory wiring where the store and the ledger share `clock`.
    pub fn in_memory_with_clock(config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(
            InMemoryInventoryStore::new()
                .with_lock_timeout(config.lock_timeout)
                .with_clock(clock.clone()),
        );
        Self::from_parts(store.clone(), store, config, clock, Backend::InMemory)
    }

    pub fn postgres(store: PostgresInventoryStore, config: LedgerConfig) -> Self {
        let store = Arc::new(store.with_lock_timeout(config.lock_timeout));
        Self::from_parts(
            store.clone(),
            store,
            config,
            Arc::new(SystemClock),
            Backend::Postgres,
        )
    }

    fn from_parts(
        store: Arc<dyn LedgerStore>,
        directory: Arc<dyn ProductDirectory>,
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
        backend: Backend,
    ) -> Self {
        Self {
            ledger: MovementLedger::new(store, directory, config).with_clock(clock),
            backend,
        }
    }

    pub fn ledger(&self) -> &AppLedger {
        &self.ledger
    }

    pub fn directory(&self) -> &Arc<dyn ProductDirectory> {
        self.ledger.directory()
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }
}

/// Build services from process configuration (connects and migrates when Postgres).
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    match &config.database {
        Some(database) => {
            let pool = db::connect(database)
                .await
                .context("failed to connect to postgres")?;
            db::migrate(&pool).await.context("failed to run migrations")?;
            info!(backend = "postgres", "stock ledger services ready");
            Ok(AppServices::postgres(
                PostgresInventoryStore::new(pool),
                config.ledger.clone(),
            ))
        }
        None => {
            info!(backend = "in_memory", "DATABASE_URL not set; using in-memory stores");
            Ok(AppServices::in_memory(config.ledger.clone()))
        }
    }
}
