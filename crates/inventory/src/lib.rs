//! Inventory domain module.
//!
//! This crate contains business rules for warehouse stock, implemented purely as
//! deterministic domain logic (no IO, no storage). The infrastructure crate
//! reads current state, asks these functions what to do, and persists the result
//! together with a movement log entry.

pub mod category;
pub mod item;
pub mod movement;
pub mod registry;

pub use category::{
    Category, CategoryDeletion, CategoryScope, MAX_ROOT_CATEGORIES, NewCategory, Placement,
    check_placement,
};
pub use item::{
    AdjustmentKind, Item, ItemQuery, ItemStatus, ItemUpdate, NameClash, NewItem,
    StockAdjustment, UpdateOutcome, check_name_available, resulting_quantity,
};
pub use movement::{
    DailySummary, MovementFilter, MovementKind, MovementLogEntry, NewLogEntry, TIMESTAMP_FORMAT,
    parse_day,
};
pub use registry::{Destination, NamedRecord, Provider, Unit, normalize_name};
