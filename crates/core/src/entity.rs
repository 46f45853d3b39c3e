//! Entity trait: a stored record with a stable row identity.

use crate::id::RowId;

/// A persisted record addressed by a typed row id.
pub trait Entity {
    /// Lower-case record kind (`"item"`, `"unit"`, ...), used in error messages.
    const KIND: &'static str;

    type Id: RowId;

    /// Returns the row identifier.
    fn id(&self) -> &Self::Id;
}
