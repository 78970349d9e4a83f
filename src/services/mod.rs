//! Business core of the batch ledger.

pub mod allocation;
pub mod batches;
pub mod deliveries;
pub mod items;
pub mod reconciliation;
pub mod retention;
pub mod sales;
pub mod stock;
