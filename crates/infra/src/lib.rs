//! Infrastructure layer: stock store, movement ledger, directory, DB, config.

pub mod clock;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod movement_log;
pub mod stock_store;

mod integration_tests;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AppConfig, ConfigError, DatabaseConfig, LedgerConfig};
pub use directory::ProductDirectory;
pub use error::StoreError;
pub use ledger::{AcceptedMovement, LedgerError, MovementLedger};
pub use movement_log::MovementLog;
pub use stock_store::{
    InMemoryInventoryStore, LedgerStore, PostgresInventoryStore, StockStore, StockTransaction,
};
