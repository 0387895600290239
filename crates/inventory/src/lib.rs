//! Inventory ledger domain module.
//!
//! Stock entries record deliveries and adjustments against a product's
//! on-hand count. This crate decides what a create or edit of an entry does to
//! that count, implemented purely as deterministic domain logic (no IO, no
//! storage); infra applies the resulting plan inside a transaction.

pub mod ledger;
pub mod stock_entry;

pub use ledger::{EntryWrite, LedgerPlan, RecordStockEntry, net_change, plan};
pub use stock_entry::{NewStockEntry, StockEntry};
