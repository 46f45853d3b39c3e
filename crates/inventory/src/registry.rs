//! Flat reference records: units, providers and destinations.

use serde::{Deserialize, Serialize};

use stockledger_core::{DestinationId, DomainError, DomainResult, Entity, ProviderId, UnitId};

/// A reference record that is nothing more than a unique name.
pub trait NamedRecord: Entity + Sized {
    fn from_parts(id: Self::Id, name: String) -> Self;

    fn name(&self) -> &str;
}

/// Trim a caller-supplied name and reject blanks.
pub fn normalize_name(kind: &'static str, raw: &str) -> DomainResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::invalid_argument(format!(
            "{kind} name cannot be empty"
        )));
    }
    Ok(name.to_string())
}

/// Unit of measure (box, kg, piece, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
}

/// Supplier that stock is received from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
}

/// Place that removed stock is shipped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: DestinationId,
    pub name: String,
}

macro_rules! impl_named_record {
    ($t:ty, $id:ty, $kind:literal) => {
        impl Entity for $t {
            const KIND: &'static str = $kind;
            type Id = $id;

            fn id(&self) -> &Self::Id {
                &self.id
            }
        }

        impl NamedRecord for $t {
            fn from_parts(id: Self::Id, name: String) -> Self {
                Self { id, name }
            }

            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

impl_named_record!(Unit, UnitId, "unit");
impl_named_record!(Provider, ProviderId, "provider");
impl_named_record!(Destination, DestinationId, "destination");
