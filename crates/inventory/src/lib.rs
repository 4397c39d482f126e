//! Stock ledger domain module.
//!
//! This crate contains the business rules for stock movements, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Infrastructure decides
//! *where* quantities and history live; this crate decides *what* a movement does.

pub mod movement;
pub mod stock;
pub mod summary;

pub use movement::{
    checked_apply, newest_first, Movement, MovementDraft, MovementKind, MovementPlan,
    MovementRequest, StockEffect, MAX_ACTOR_LEN, MAX_REASON_LEN,
};
pub use stock::{NewProduct, ProductStock};
pub use summary::{day_bounds, month_bounds, MovementSummary};
