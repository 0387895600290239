//! Infrastructure layer: storage adapters, the transactional inventory
//! ledger, configuration and the home page read model.

pub mod config;
pub mod error;
pub mod home;
pub mod ledger;
pub mod store;

mod integration_tests;

pub use config::StorefrontConfig;
pub use error::{StoreError, StoreResult};
pub use home::HomePage;
pub use ledger::{InventoryLedger, Recorded};
pub use store::{CartOwner, InMemoryStore, LedgerTx, PostgresStore, UnitOfWork};
