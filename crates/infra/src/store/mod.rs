//! Storage adapters for storefront records.
//!
//! Two adapters exist: [`InMemoryStore`] for tests/dev and [`PostgresStore`]
//! for production. Both apply stock entries through the same pure
//! reconciliation (`storefront_inventory::plan`) and both hold a write lock on
//! the product for the whole read-modify-write.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

use storefront_catalog::Product;
use storefront_core::{CartId, ProductId, StockEntryId, UserId};
use storefront_inventory::{NewStockEntry, StockEntry};

use crate::error::StoreResult;

/// Which cart an add-to-cart lands in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CartOwner {
    /// The user's active cart, opened on first use.
    User(UserId),
    /// An anonymous cart: `None` opens a new one, `Some` continues an
    /// existing active cart.
    Anonymous(Option<CartId>),
}

/// Operations available inside one ledger transaction.
pub trait LedgerTx {
    /// Read a product and hold its write lock until the unit of work ends.
    fn lock_product(&mut self, id: ProductId) -> StoreResult<Option<Product>>;

    fn stock_entry(&mut self, id: StockEntryId) -> StoreResult<Option<StockEntry>>;

    fn set_product_quantity(&mut self, id: ProductId, quantity: i64) -> StoreResult<()>;

    fn insert_stock_entry(&mut self, entry: NewStockEntry) -> StoreResult<StockEntry>;

    fn update_stock_entry(&mut self, entry: &StockEntry) -> StoreResult<()>;
}

/// Scoped transaction boundary.
///
/// `atomically` commits when `work` returns `Ok` and discards every write
/// made through the transaction on any other exit path.
pub trait UnitOfWork: Send + Sync {
    fn atomically<T, F>(&self, work: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn LedgerTx) -> StoreResult<T>;
}

impl<S: UnitOfWork> UnitOfWork for std::sync::Arc<S> {
    fn atomically<T, F>(&self, work: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn LedgerTx) -> StoreResult<T>,
    {
        (**self).atomically(work)
    }
}
