//! Domain error model.

use thiserror::Error;

use crate::id::ItemId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business failures (validation, state
/// rules, conflicts). Storage failures are wrapped by the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The request collides with existing data.
    #[error("conflict: {0}")]
    Conflict(Conflict),

    /// The operation would leave a record in a forbidden state
    /// (e.g. a negative stock quantity).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A caller-supplied value is malformed or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A fixed capacity (such as the root category cap) would be exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),
}

/// Kinds of conflict a write can run into.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// An active item already carries this name.
    #[error(
        "an active item named '{name}' already exists{}",
        .category.as_deref().map(|c| format!(" in category '{c}'")).unwrap_or_default()
    )]
    Duplicate {
        name: String,
        category: Option<String>,
    },

    /// A non-active item carries this name; the caller should restore it.
    #[error("item '{name}' exists but is {status}; restore item {item_id} instead")]
    Restorable {
        item_id: ItemId,
        name: String,
        status: &'static str,
    },

    #[error("barcode '{barcode}' is already in use by another item")]
    BarcodeInUse { barcode: String },

    #[error("{entity} name '{name}' is already in use")]
    NameInUse { entity: &'static str, name: String },

    /// The record is still referenced and cannot be deleted.
    #[error("{entity} {id} is still in use")]
    InUse { entity: &'static str, id: String },
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn limit_exceeded(msg: impl Into<String>) -> Self {
        Self::LimitExceeded(msg.into())
    }

    pub fn name_in_use(entity: &'static str, name: impl Into<String>) -> Self {
        Self::Conflict(Conflict::NameInUse {
            entity,
            name: name.into(),
        })
    }

    pub fn in_use(entity: &'static str, id: impl ToString) -> Self {
        Self::Conflict(Conflict::InUse {
            entity,
            id: id.to_string(),
        })
    }
}

impl From<Conflict> for DomainError {
    fn from(value: Conflict) -> Self {
        Self::Conflict(value)
    }
}
