//! Persistent entities of the batch ledger.
//!
//! Every table carries the owning seller (tenant); services must scope
//! every query by it.

pub mod batch;
pub mod catalogue_item;
pub mod delivery_schedule;
pub mod item_sale;
pub mod order;
pub mod order_item;
pub mod sale;
