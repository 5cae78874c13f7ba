//! Inventory movement history.
//!
//! This crate contains the movement record and the monthly aggregation rules
//! that turn raw movements into forecasting history, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod monthly;
pub mod movement;

pub use monthly::monthly_aggregates;
pub use movement::{InventoryMovement, RecordMovement};
