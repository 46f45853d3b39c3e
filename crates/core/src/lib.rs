//! `stockledger-core`: foundation types shared by every stockledger crate.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed row identifiers, the error taxonomy and pagination.

pub mod entity;
pub mod error;
pub mod id;
pub mod page;

pub use entity::Entity;
pub use error::{Conflict, DomainError, DomainResult};
pub use id::{CategoryId, DestinationId, EntryId, ItemId, ProviderId, RowId, UnitId};
pub use page::{MAX_PAGE_SIZE, Page, PageRequest};
