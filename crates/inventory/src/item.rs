use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    CategoryId, Conflict, DestinationId, DomainError, DomainResult, Entity, ItemId, ProviderId,
    UnitId,
};

use crate::movement::MovementKind;
use crate::registry::normalize_name;

/// Visibility state of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Active,
    Inactive,
    /// Terminal state reached only when the item's category is deleted.
    Archived,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Active => "active",
            ItemStatus::Inactive => "inactive",
            ItemStatus::Archived => "archived",
        }
    }

    /// Only `active` and `inactive` may be set directly.
    pub fn ensure_settable(self) -> DomainResult<Self> {
        match self {
            ItemStatus::Active | ItemStatus::Inactive => Ok(self),
            ItemStatus::Archived => Err(DomainError::invalid_argument(
                "status must be 'active' or 'inactive'; items are archived by deleting their category",
            )),
        }
    }
}

impl core::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(ItemStatus::Active),
            "inactive" => Ok(ItemStatus::Inactive),
            "archived" => Ok(ItemStatus::Archived),
            other => Err(DomainError::invalid_argument(format!(
                "unknown item status '{other}'"
            ))),
        }
    }
}

/// A stock item as read back from the store, joined with display names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub current_quantity: i64,
    pub unit_id: UnitId,
    pub unit_name: String,
    pub sub_category_id: Option<CategoryId>,
    pub sub_category_name: Option<String>,
    pub provider_id: Option<ProviderId>,
    pub provider_name: Option<String>,
    pub cost: Option<Decimal>,
    pub barcode: Option<String>,
    pub status: ItemStatus,
}

impl Item {
    pub fn is_active(&self) -> bool {
        self.status == ItemStatus::Active
    }
}

impl Entity for Item {
    const KIND: &'static str = "item";
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Blank barcodes mean "no barcode".
fn normalize_barcode(raw: Option<String>) -> Option<String> {
    raw.map(|b| b.trim().to_string()).filter(|b| !b.is_empty())
}

/// Command: create an item with its opening stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub unit_id: UnitId,
    pub sub_category_id: CategoryId,
    pub quantity: i64,
    pub provider_id: Option<ProviderId>,
    pub cost: Option<Decimal>,
    pub actor: Option<String>,
    pub barcode: Option<String>,
}

impl NewItem {
    pub fn new(
        name: impl Into<String>,
        unit_id: UnitId,
        sub_category_id: CategoryId,
        quantity: i64,
    ) -> Self {
        Self {
            name: name.into(),
            unit_id,
            sub_category_id,
            quantity,
            provider_id: None,
            cost: None,
            actor: None,
            barcode: None,
        }
    }

    /// Trim free-text fields and check the opening quantity.
    pub fn normalized(mut self) -> DomainResult<Self> {
        self.name = normalize_name(Item::KIND, &self.name)?;
        if self.quantity < 0 {
            return Err(DomainError::invalid_argument(
                "initial quantity cannot be negative",
            ));
        }
        self.barcode = normalize_barcode(self.barcode);
        Ok(self)
    }
}

/// An existing item whose name matches a create request (case-insensitively).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameClash {
    pub item_id: ItemId,
    pub name: String,
    pub status: ItemStatus,
    pub category: Option<String>,
}

/// Decide whether a new item may take a name, given any existing holder.
///
/// A non-active holder is restorable; an active holder is a plain duplicate.
pub fn check_name_available(clash: Option<NameClash>) -> DomainResult<()> {
    match clash {
        None => Ok(()),
        Some(existing) if existing.status == ItemStatus::Active => {
            Err(DomainError::Conflict(Conflict::Duplicate {
                name: existing.name,
                category: existing.category,
            }))
        }
        Some(existing) => Err(DomainError::Conflict(Conflict::Restorable {
            item_id: existing.item_id,
            name: existing.name,
            status: existing.status.as_str(),
        })),
    }
}

/// Direction of a quantity adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentKind {
    Addition,
    Removal,
}

impl AdjustmentKind {
    pub fn movement_kind(self) -> MovementKind {
        match self {
            AdjustmentKind::Addition => MovementKind::Addition,
            AdjustmentKind::Removal => MovementKind::Removal,
        }
    }

    /// The delta as it is recorded in the ledger: negative for removals.
    pub fn signed(self, delta: i64) -> i64 {
        match self {
            AdjustmentKind::Addition => delta,
            AdjustmentKind::Removal => -delta,
        }
    }
}

impl FromStr for AdjustmentKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "addition" => Ok(AdjustmentKind::Addition),
            "removal" => Ok(AdjustmentKind::Removal),
            other => Err(DomainError::invalid_argument(format!(
                "adjustment kind must be 'addition' or 'removal', got '{other}'"
            ))),
        }
    }
}

/// Command: add stock to or remove stock from an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub item_id: ItemId,
    /// Positive magnitude; the direction comes from `kind`.
    pub delta: i64,
    pub kind: AdjustmentKind,
    pub actor: Option<String>,
    pub provider_id: Option<ProviderId>,
    pub cost: Option<Decimal>,
    pub destination_id: Option<DestinationId>,
}

impl StockAdjustment {
    pub fn new(item_id: ItemId, delta: i64, kind: AdjustmentKind) -> Self {
        Self {
            item_id,
            delta,
            kind,
            actor: None,
            provider_id: None,
            cost: None,
            destination_id: None,
        }
    }

    pub fn addition(item_id: ItemId, delta: i64) -> Self {
        Self::new(item_id, delta, AdjustmentKind::Addition)
    }

    pub fn removal(item_id: ItemId, delta: i64) -> Self {
        Self::new(item_id, delta, AdjustmentKind::Removal)
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// Compute the quantity an adjustment leaves behind.
pub fn resulting_quantity(current: i64, delta: i64, kind: AdjustmentKind) -> DomainResult<i64> {
    if delta <= 0 {
        return Err(DomainError::invalid_argument(
            "adjustment delta must be positive",
        ));
    }
    let next = current
        .checked_add(kind.signed(delta))
        .ok_or_else(|| DomainError::invalid_state("quantity overflow"))?;
    if next < 0 {
        return Err(DomainError::invalid_state("negative quantity"));
    }
    Ok(next)
}

/// Command: edit an item's descriptive fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub item_id: ItemId,
    pub name: String,
    pub unit_id: UnitId,
    pub sub_category_id: Option<CategoryId>,
    pub barcode: Option<String>,
    pub actor: Option<String>,
    /// Apply a unit change even though the item already has ledger history.
    pub force_unit_change: bool,
}

impl ItemUpdate {
    pub fn normalized(mut self) -> DomainResult<Self> {
        self.name = normalize_name(Item::KIND, &self.name)?;
        self.barcode = normalize_barcode(self.barcode);
        Ok(self)
    }

    pub fn changes_unit(&self, current: &Item) -> bool {
        self.unit_id != current.unit_id
    }

    /// The new barcode, if it differs from the item's current one.
    pub fn new_barcode<'a>(&'a self, current: &Item) -> Option<&'a str> {
        self.barcode
            .as_deref()
            .filter(|b| current.barcode.as_deref() != Some(*b))
    }

    /// Human-readable summary of what this update changes, for the ledger.
    pub fn describe_changes(&self, current: &Item) -> String {
        let mut changes = Vec::new();
        if self.name != current.name {
            changes.push(format!("name '{}' -> '{}'", current.name, self.name));
        }
        if self.unit_id != current.unit_id {
            changes.push("unit changed".to_string());
        }
        if self.sub_category_id != current.sub_category_id {
            changes.push("category changed".to_string());
        }
        if self.barcode != current.barcode {
            changes.push("barcode changed".to_string());
        }
        if changes.is_empty() {
            "Item details updated.".to_string()
        } else {
            format!("Item details updated: {}.", changes.join(", "))
        }
    }
}

/// Result of [`ItemUpdate`]: either applied, or held back for confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    Updated(Item),
    /// Nothing was written; re-issue with `force_unit_change` to proceed.
    ConfirmationRequired { reason: String },
}

impl UpdateOutcome {
    pub const UNIT_CHANGE_REASON: &'static str =
        "changing the unit may change how existing movement log entries read";

    pub fn item(&self) -> Option<&Item> {
        match self {
            UpdateOutcome::Updated(item) => Some(item),
            UpdateOutcome::ConfirmationRequired { .. } => None,
        }
    }

    pub fn is_confirmation_required(&self) -> bool {
        matches!(self, UpdateOutcome::ConfirmationRequired { .. })
    }
}

/// Listing criteria for active items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuery {
    /// Substring matched against name, id and barcode.
    pub search: Option<String>,
    pub sub_category_id: Option<CategoryId>,
}
