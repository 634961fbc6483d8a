//! Enumeration types for the Muster unit ledger.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// The kind of a unit event.
///
/// The declaration order is the persisted `event_type_id` order and must
/// never be rearranged: stored rows refer to kinds by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The unit came into existence.
    Create,
    /// The unit received a new name.
    Rename,
    /// The unit changed unit type.
    Upgrade,
    /// The unit joined a composite unit.
    Assign,
    /// Reciprocal of [`EventKind::Assign`], recorded on the composite.
    AssignTo,
    /// The unit left its composite unit.
    Unassign,
    /// The unit earned a promotion.
    Promote,
    /// The unit changed location.
    Move,
    /// The unit's headquarters moved.
    #[serde(rename = "transferhq")]
    TransferHq,
    /// The unit was destroyed or disbanded.
    Destroy,
    /// A freeform history note.
    History,
    /// The unit destroyed an enemy unit.
    Victory,
}

impl EventKind {
    /// Every kind, in persisted `event_type_id` order.
    pub const ALL: [Self; 12] = [
        Self::Create,
        Self::Rename,
        Self::Upgrade,
        Self::Assign,
        Self::AssignTo,
        Self::Unassign,
        Self::Promote,
        Self::Move,
        Self::TransferHq,
        Self::Destroy,
        Self::History,
        Self::Victory,
    ];

    /// The persisted `event_type_id` of this kind.
    pub const fn type_id(self) -> i64 {
        match self {
            Self::Create => 0,
            Self::Rename => 1,
            Self::Upgrade => 2,
            Self::Assign => 3,
            Self::AssignTo => 4,
            Self::Unassign => 5,
            Self::Promote => 6,
            Self::Move => 7,
            Self::TransferHq => 8,
            Self::Destroy => 9,
            Self::History => 10,
            Self::Victory => 11,
        }
    }

    /// Resolve a persisted `event_type_id`.
    pub const fn from_type_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(Self::Create),
            1 => Some(Self::Rename),
            2 => Some(Self::Upgrade),
            3 => Some(Self::Assign),
            4 => Some(Self::AssignTo),
            5 => Some(Self::Unassign),
            6 => Some(Self::Promote),
            7 => Some(Self::Move),
            8 => Some(Self::TransferHq),
            9 => Some(Self::Destroy),
            10 => Some(Self::History),
            11 => Some(Self::Victory),
            _ => None,
        }
    }

    /// The wire name of this kind (as used in payload tags).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Rename => "rename",
            Self::Upgrade => "upgrade",
            Self::Assign => "assign",
            Self::AssignTo => "assign_to",
            Self::Unassign => "unassign",
            Self::Promote => "promote",
            Self::Move => "move",
            Self::TransferHq => "transferhq",
            Self::Destroy => "destroy",
            Self::History => "history",
            Self::Victory => "victory",
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
