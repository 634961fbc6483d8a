//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use muster_types::{EventId, UnitId};

/// Track military units through time as an append-only event log.
#[derive(Debug, Parser)]
#[command(name = "muster", version, about)]
pub struct Cli {
    /// Configuration file (YAML). Missing files fall back to defaults.
    #[arg(short, long, global = true, env = "MUSTER_CONFIG", default_value = "muster.yaml")]
    pub config: PathBuf,

    /// Event database, overriding the configured path.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Game-data catalog, overriding the configured path.
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// A unit and the year a write takes effect.
#[derive(Debug, Args)]
pub struct At {
    /// Unit id.
    pub unit: UnitId,
    /// Game year (negative for BC).
    #[arg(allow_negative_numbers = true)]
    pub year: i64,
}

/// Cutoff and liveness filter shared by listing commands.
#[derive(Debug, Args)]
pub struct Cutoff {
    /// Show the state as of this year instead of the latest.
    #[arg(long, allow_negative_numbers = true)]
    pub year: Option<i64>,
    /// Leave out units destroyed by the cutoff.
    #[arg(long)]
    pub live: bool,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a unit and print its id.
    Create {
        /// Game year of creation.
        #[arg(allow_negative_numbers = true)]
        year: i64,
        /// Unit-type key.
        unit_type: String,
        /// Where the unit was raised.
        location: String,
        /// Name; defaults to "<type>-<id>".
        #[arg(long, default_value = "")]
        name: String,
    },

    /// Rename a unit.
    Rename {
        #[command(flatten)]
        at: At,
        /// The new name.
        name: String,
    },

    /// Change a unit's type.
    Upgrade {
        #[command(flatten)]
        at: At,
        /// The new unit-type key.
        unit_type: String,
    },

    /// Move a unit.
    Move {
        #[command(flatten)]
        at: At,
        /// The new location.
        location: String,
    },

    /// Transfer a unit's headquarters.
    Hq {
        #[command(flatten)]
        at: At,
        /// The new headquarters.
        location: String,
        /// Subordinates that move their headquarters along.
        #[arg(long = "with", value_delimiter = ',')]
        followers: Vec<UnitId>,
    },

    /// Attach a unit to a composite.
    Assign {
        #[command(flatten)]
        at: At,
        /// The composite to join.
        composite: UnitId,
        /// Also move the unit's headquarters to the composite's.
        #[arg(long)]
        transfer_hq: bool,
    },

    /// Detach a unit from its composite.
    Unassign {
        #[command(flatten)]
        at: At,
    },

    /// Promote a unit.
    Promote {
        #[command(flatten)]
        at: At,
        /// Promotion name.
        promotion: String,
    },

    /// Destroy a unit. Without an enemy this is a disbandment.
    Destroy {
        #[command(flatten)]
        at: At,
        /// Owner of the destroying unit.
        #[arg(long, requires = "enemy_type")]
        owner: Option<String>,
        /// Unit type of the destroying unit.
        #[arg(long, requires = "owner")]
        enemy_type: Option<String>,
        /// Proper name of the destroying unit.
        #[arg(long, requires = "owner")]
        enemy_name: Option<String>,
        /// History note recorded after the destruction.
        #[arg(long)]
        note: Option<String>,
    },

    /// Disband a unit.
    Disband {
        #[command(flatten)]
        at: At,
    },

    /// Add a history note.
    Note {
        #[command(flatten)]
        at: At,
        /// Note text.
        text: String,
    },

    /// Record a victory over an enemy unit.
    Victory {
        #[command(flatten)]
        at: At,
        /// Owner of the defeated unit.
        owner: String,
        /// Unit type of the defeated unit.
        enemy_type: String,
        /// Proper name of the defeated unit.
        #[arg(long)]
        enemy_name: Option<String>,
    },

    /// Delete one event (and its reciprocal, for an assignment).
    DeleteEvent {
        /// Event id.
        event: EventId,
    },

    /// Show a unit as of a year.
    View {
        /// Unit id.
        unit: UnitId,
        /// Cutoff year; latest when omitted.
        #[arg(long, allow_negative_numbers = true)]
        year: Option<i64>,
        /// Print the view as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the raw events of a unit.
    Events {
        /// Unit id.
        unit: UnitId,
    },

    /// List unit ids and names.
    List {
        #[command(flatten)]
        cutoff: Cutoff,
    },

    /// Print every unit nested under its composite, with strengths.
    Roster {
        #[command(flatten)]
        cutoff: Cutoff,
        /// Do not nest subordinates.
        #[arg(long)]
        flat: bool,
    },

    /// Detailed report of a unit and its formation.
    Report {
        /// Unit id.
        unit: UnitId,
        /// Cutoff year; latest when omitted.
        #[arg(long, allow_negative_numbers = true)]
        year: Option<i64>,
    },

    /// Print the first and last year in the log.
    Years,

    /// Manage unit types in the catalog.
    #[command(subcommand)]
    UnitType(UnitTypeCommand),

    /// Manage promotions in the catalog.
    #[command(subcommand)]
    Promotion(PromotionCommand),
}

/// `unit-type` subcommands.
#[derive(Debug, Subcommand)]
pub enum UnitTypeCommand {
    /// Define or replace a unit type.
    Set {
        /// Unit-type key used by events.
        key: String,
        /// Display name; defaults to the key.
        #[arg(long)]
        display: Option<String>,
        /// Unit class.
        #[arg(long, default_value = "")]
        class: String,
        /// Base combat strength.
        #[arg(long, default_value_t = 0)]
        strength: u32,
        /// Movement points.
        #[arg(long = "move", default_value_t = 1)]
        movement: u32,
        /// Production cost.
        #[arg(long, default_value_t = 0)]
        cost: u32,
        /// Replace an existing definition.
        #[arg(long)]
        overwrite: bool,
    },
    /// Remove a unit type.
    Del {
        /// Unit-type key.
        key: String,
    },
    /// List unit types.
    List,
}

/// `promotion` subcommands.
#[derive(Debug, Subcommand)]
pub enum PromotionCommand {
    /// Add a promotion.
    Add {
        /// Promotion name.
        name: String,
    },
    /// Remove a promotion.
    Del {
        /// Promotion name.
        name: String,
    },
    /// List promotions.
    List,
}
