//! Movement log vocabulary: entry kinds, entries and query filters.

use core::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DestinationId, DomainError, Entity, EntryId, ItemId, ProviderId};

/// Text layout of ledger timestamps in storage. Sorts lexically in time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// What happened to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementKind {
    Creation,
    Addition,
    Removal,
    Update,
    #[serde(rename = "Status Change")]
    StatusChange,
    Restored,
}

impl MovementKind {
    pub const ALL: [MovementKind; 6] = [
        MovementKind::Creation,
        MovementKind::Addition,
        MovementKind::Removal,
        MovementKind::Update,
        MovementKind::StatusChange,
        MovementKind::Restored,
    ];

    /// Stored label.
    pub fn label(&self) -> &'static str {
        match self {
            MovementKind::Creation => "Creation",
            MovementKind::Addition => "Addition",
            MovementKind::Removal => "Removal",
            MovementKind::Update => "Update",
            MovementKind::StatusChange => "Status Change",
            MovementKind::Restored => "Restored",
        }
    }

    /// Parse a comma-separated list of labels.
    ///
    /// Blank segments are skipped and unknown labels select nothing, so
    /// `"Teleport"` gives `Some(vec![])`. `None` when no label is given.
    pub fn parse_list(raw: &str) -> Option<Vec<MovementKind>> {
        let mut parts = raw
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .peekable();
        parts.peek()?;

        let mut kinds = Vec::new();
        for kind in parts.filter_map(|p| p.parse::<MovementKind>().ok()) {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Some(kinds)
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        MovementKind::ALL
            .into_iter()
            .find(|k| k.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                DomainError::invalid_argument(format!("unknown movement kind '{wanted}'"))
            })
    }
}

/// An entry about to be appended. The ledger assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogEntry {
    pub item_id: ItemId,
    pub item_name: String,
    pub kind: MovementKind,
    pub quantity_changed: Option<i64>,
    pub resulting_quantity: Option<i64>,
    pub provider_id: Option<ProviderId>,
    pub destination_id: Option<DestinationId>,
    pub unit_cost: Option<Decimal>,
    pub details: Option<String>,
    pub actor: Option<String>,
}

impl NewLogEntry {
    pub fn new(item_id: ItemId, item_name: impl Into<String>, kind: MovementKind) -> Self {
        Self {
            item_id,
            item_name: item_name.into(),
            kind,
            quantity_changed: None,
            resulting_quantity: None,
            provider_id: None,
            destination_id: None,
            unit_cost: None,
            details: None,
            actor: None,
        }
    }

    pub fn quantities(mut self, changed: i64, resulting: i64) -> Self {
        self.quantity_changed = Some(changed);
        self.resulting_quantity = Some(resulting);
        self
    }

    pub fn provider(mut self, provider_id: Option<ProviderId>) -> Self {
        self.provider_id = provider_id;
        self
    }

    pub fn destination(mut self, destination_id: Option<DestinationId>) -> Self {
        self.destination_id = destination_id;
        self
    }

    pub fn unit_cost(mut self, cost: Option<Decimal>) -> Self {
        self.unit_cost = cost;
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn actor(mut self, actor: Option<String>) -> Self {
        self.actor = actor;
        self
    }
}

/// A stored, immutable movement log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementLogEntry {
    pub id: EntryId,
    pub item_id: ItemId,
    /// Item name at the time of the movement.
    pub item_name: String,
    pub kind: MovementKind,
    pub quantity_changed: Option<i64>,
    pub resulting_quantity: Option<i64>,
    pub provider_id: Option<ProviderId>,
    /// `None` when the provider row no longer exists.
    pub provider_name: Option<String>,
    pub destination_id: Option<DestinationId>,
    pub destination_name: Option<String>,
    pub unit_cost: Option<Decimal>,
    pub details: Option<String>,
    pub actor: Option<String>,
    pub timestamp: NaiveDateTime,
}

impl Entity for MovementLogEntry {
    const KIND: &'static str = "movement log entry";
    type Id = EntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Parse a `YYYY-MM-DD` calendar day.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Ledger query filters. All set filters must match; `kinds` match any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementFilter {
    pub item_id: Option<ItemId>,
    /// `Some(vec![])` matches no entry.
    #[serde(default)]
    pub kinds: Option<Vec<MovementKind>>,
    pub provider_id: Option<ProviderId>,
    pub destination_id: Option<DestinationId>,
    /// Inclusive first day, `YYYY-MM-DD`. Ignored when malformed.
    pub date_from: Option<String>,
    /// Inclusive last day, `YYYY-MM-DD`. Ignored when malformed.
    pub date_to: Option<String>,
}

impl MovementFilter {
    pub fn for_item(item_id: ItemId) -> Self {
        Self {
            item_id: Some(item_id),
            ..Self::default()
        }
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = MovementKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn between(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.date_from = Some(from.into());
        self.date_to = Some(to.into());
        self
    }
}

/// Counts of today's additions and removals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub additions_today: u64,
    pub withdrawals_today: u64,
    /// Set when the counts could not be computed; the counts are then zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DailySummary {
    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            additions_today: 0,
            withdrawals_today: 0,
            error: Some(error.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}
