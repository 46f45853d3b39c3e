//! Infrastructure layer: SQLite storage for the inventory ledger.
//!
//! Every item mutation runs in one transaction together with the movement log
//! entry that describes it. Free functions in [`items`], [`ledger`] and
//! [`categories`] take an open connection so callers can compose them inside a
//! transaction they own; the store types wrap each call in its own transaction.

pub mod categories;
pub mod config;
pub mod db;
pub mod error;
pub mod items;
pub mod ledger;
pub mod registry;

mod inventory;
mod row;

#[cfg(test)]
mod integration_tests;

pub use categories::CategoryRegistry;
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use inventory::Inventory;
pub use items::ItemStore;
pub use ledger::MovementLedger;
pub use registry::{DestinationRegistry, NamedRegistry, ProviderRegistry, UnitRegistry};
