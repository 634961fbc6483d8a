//! Core structs: events, payloads, and materialized unit views.

use serde::{Deserialize, Serialize};

use crate::enums::EventKind;
use crate::ids::{EventId, UnitId};

/// Reserved unit-type key marking a composite (formation) unit.
///
/// Composites aggregate other units and have no intrinsic strength.
pub const COMPOSITE_UNIT_TYPE: &str = "Composite Unit";

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// An enemy unit named by a `destroy` or `victory` event.
///
/// Fields hold catalog keys; display names are resolved when a view is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyUnit {
    /// Owner (civilization or player) key of the enemy unit.
    pub owner: String,
    /// Unit-type key of the enemy unit.
    pub unit_type: String,
    /// Proper name of the enemy unit, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EnemyUnit {
    /// An unnamed enemy unit.
    pub fn new(owner: impl Into<String>, unit_type: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            unit_type: unit_type.into(),
            name: None,
        }
    }

    /// Attach a proper name. Empty names are treated as absent.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.is_empty() { None } else { Some(name) };
        self
    }
}

/// Kind-specific data carried by an event.
///
/// Serialized adjacently tagged so the `data` body alone can be stored in
/// the `event_payload` column while the tag lives in `event_type_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    /// Unit creation.
    Create {
        /// Initial name. Empty means "derive from type and id".
        name: String,
        /// Initial unit-type key.
        unit_type: String,
        /// Location where the unit was raised.
        location: String,
    },
    /// Unit renamed.
    Rename {
        /// The new name.
        name: String,
    },
    /// Unit type changed.
    Upgrade {
        /// The new unit-type key.
        unit_type: String,
    },
    /// Unit joined a composite.
    Assign {
        /// The composite joined.
        composite_id: UnitId,
    },
    /// A subordinate joined this composite.
    AssignTo {
        /// The subordinate that joined.
        unit_id: UnitId,
    },
    /// Unit left its composite.
    Unassign {},
    /// Unit promoted.
    Promote {
        /// Promotion name.
        promotion: String,
    },
    /// Unit moved.
    Move {
        /// The new location.
        location: String,
    },
    /// Headquarters transferred.
    #[serde(rename = "transferhq")]
    TransferHq {
        /// The new headquarters location.
        location: String,
    },
    /// Unit destroyed (with an enemy) or disbanded (without).
    Destroy {
        /// The destroying enemy, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enemy: Option<EnemyUnit>,
    },
    /// Freeform note.
    History {
        /// The note text.
        note: String,
    },
    /// Unit destroyed an enemy.
    Victory {
        /// The defeated enemy.
        enemy: EnemyUnit,
    },
}

impl EventPayload {
    /// The kind of event this payload belongs to.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Create { .. } => EventKind::Create,
            Self::Rename { .. } => EventKind::Rename,
            Self::Upgrade { .. } => EventKind::Upgrade,
            Self::Assign { .. } => EventKind::Assign,
            Self::AssignTo { .. } => EventKind::AssignTo,
            Self::Unassign {} => EventKind::Unassign,
            Self::Promote { .. } => EventKind::Promote,
            Self::Move { .. } => EventKind::Move,
            Self::TransferHq { .. } => EventKind::TransferHq,
            Self::Destroy { .. } => EventKind::Destroy,
            Self::History { .. } => EventKind::History,
            Self::Victory { .. } => EventKind::Victory,
        }
    }

    /// Serialize only the kind-specific body (the `data` half of the tag).
    pub fn to_body(&self) -> Result<serde_json::Value, serde_json::Error> {
        let tagged = serde_json::to_value(self)?;
        Ok(match tagged {
            serde_json::Value::Object(mut map) => map
                .remove("data")
                .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
            other => other,
        })
    }

    /// Rebuild a payload from its kind and stored body.
    pub fn from_body(kind: EventKind, body: serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut tagged = serde_json::Map::new();
        tagged.insert("kind".to_owned(), serde_json::Value::from(kind.as_str()));
        tagged.insert("data".to_owned(), body);
        serde_json::from_value(serde_json::Value::Object(tagged))
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An immutable event recorded in the event store.
///
/// Events of one unit, ordered by `(year, id)`, are that unit's full history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitEvent {
    /// Store-assigned identifier, monotonic in insertion order.
    pub id: EventId,
    /// The unit this event belongs to.
    pub unit_id: UnitId,
    /// In-game year (negative for BC).
    pub year: i64,
    /// Kind-specific data.
    pub payload: EventPayload,
}

impl UnitEvent {
    /// The kind of this event.
    pub const fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Sort key giving the canonical history order.
    pub const fn order_key(&self) -> (i64, EventId) {
        (self.year, self.id)
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// An enemy unit with catalog keys and their resolved display names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyView {
    /// Owner key as stored.
    pub owner: String,
    /// Owner display name.
    pub owner_display: String,
    /// Unit-type key as stored.
    pub unit_type: String,
    /// Unit-type display name.
    pub unit_type_display: String,
    /// Proper name, when recorded.
    pub name: Option<String>,
}

/// One line of a unit's chronological history.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Year of the underlying event.
    pub year: i64,
    /// The event that produced this line.
    pub event_id: EventId,
    /// Human-readable text.
    pub text: String,
}

/// A victory recorded against an enemy unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Victory {
    /// Year of the victory.
    pub year: i64,
    /// The defeated enemy.
    pub enemy: EnemyView,
}

/// A unit's state as of some cutoff year, folded from its events.
///
/// Views are derived and disposable; the event log is the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitView {
    /// The unit.
    pub id: UnitId,
    /// Current name.
    pub name: String,
    /// Current unit-type key.
    pub unit_type: String,
    /// Display name of the current unit type.
    pub unit_type_display: String,
    /// Current location.
    pub location: String,
    /// Current headquarters, if one was ever set.
    pub headquarters: Option<String>,
    /// The composite this unit is attached to, if any.
    pub composite_unit_id: Option<UnitId>,
    /// Whether the unit has been destroyed or disbanded.
    pub is_dead: bool,
    /// The enemy that destroyed this unit, if recorded.
    pub destroyed_by: Option<EnemyView>,
    /// Promotions in the order earned.
    pub promotions: Vec<String>,
    /// Chronological history, ordered by `(year, event_id)`.
    pub history: Vec<HistoryEntry>,
    /// Units attached to this composite, in first-assignment order.
    pub subordinate_units: Vec<UnitId>,
    /// Victories in chronological order.
    pub victories: Vec<Victory>,
}

impl UnitView {
    /// An empty view for the given unit, before any event is applied.
    pub const fn new(id: UnitId) -> Self {
        Self {
            id,
            name: String::new(),
            unit_type: String::new(),
            unit_type_display: String::new(),
            location: String::new(),
            headquarters: None,
            composite_unit_id: None,
            is_dead: false,
            destroyed_by: None,
            promotions: Vec::new(),
            history: Vec::new(),
            subordinate_units: Vec::new(),
            victories: Vec::new(),
        }
    }

    /// Whether this unit is currently a composite.
    pub fn is_composite(&self) -> bool {
        self.unit_type == COMPOSITE_UNIT_TYPE
    }
}
