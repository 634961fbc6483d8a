//! Read-side projections over unit views: formation reports and rosters.
//!
//! Both walk the assignment hierarchy as of one year. A [`UnitReport`]
//! merges everything below one unit (promotion and victory tallies, the
//! subunit tree, the combined history). A [`Roster`] lists every unit with
//! subordinates nested under their composites.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use muster_store::EventStore;
use muster_types::{EventId, UnitId, UnitView};

use crate::cache::ViewCache;
use crate::error::TroopError;
use crate::manager::TroopManager;
use crate::strength::StrengthModel;
use crate::view::ViewSource;

// ---------------------------------------------------------------------------
// Unit report
// ---------------------------------------------------------------------------

/// A unit in the subunit tree of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubunitLine {
    /// Nesting depth below the reported unit (1 = direct subordinate).
    pub depth: usize,
    /// The subunit.
    pub unit_id: UnitId,
    /// Its name as of the report year.
    pub name: String,
}

/// One line of the merged hierarchy history.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReportHistoryLine {
    /// Year of the event.
    pub year: i64,
    /// The event.
    pub event_id: EventId,
    /// Name of the unit the event belongs to.
    pub unit_name: String,
    /// History text.
    pub text: String,
}

/// Detail report of a unit and everything attached below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    /// The reported unit.
    pub view: UnitView,
    /// Name of the composite the unit belongs to, if any.
    pub composite_name: Option<String>,
    /// Strength summary, when a strength model was supplied.
    pub strength: Option<String>,
    /// Promotion counts across the hierarchy.
    pub promotions: BTreeMap<String, usize>,
    /// Victory counts by defeated unit type.
    pub victories_by_type: BTreeMap<String, usize>,
    /// Victory counts by defeated owner.
    pub victories_by_owner: BTreeMap<String, usize>,
    /// Total victories across the hierarchy.
    pub victory_count: usize,
    /// Subunits in depth-first order.
    pub subunits: Vec<SubunitLine>,
    /// History of every unit in the hierarchy, sorted by year then event.
    pub history: Vec<ReportHistoryLine>,
}

impl UnitReport {
    /// Build the report for `unit_id` as of `year`.
    ///
    /// Returns `None` when the unit does not exist by `year`.
    pub fn build(
        views: &dyn ViewSource,
        unit_id: UnitId,
        year: Option<i64>,
        strength: Option<&StrengthModel<'_>>,
    ) -> Result<Option<Self>, TroopError> {
        let Some(view) = views.unit_view(unit_id, year)? else {
            return Ok(None);
        };
        let composite_name = match view.composite_unit_id {
            Some(parent) => views.unit_view(parent, year)?.map(|v| v.name),
            None => None,
        };
        let strength = strength
            .map(|model| summary_or_unknown(model, views, &view, year))
            .transpose()?;

        let mut report = Self {
            view: view.clone(),
            composite_name,
            strength,
            promotions: BTreeMap::new(),
            victories_by_type: BTreeMap::new(),
            victories_by_owner: BTreeMap::new(),
            victory_count: 0,
            subunits: Vec::new(),
            history: Vec::new(),
        };
        let mut visited = BTreeSet::new();
        report.collect(views, &view, year, 0, &mut visited)?;
        report.history.sort();
        Ok(Some(report))
    }

    fn collect(
        &mut self,
        views: &dyn ViewSource,
        view: &UnitView,
        year: Option<i64>,
        depth: usize,
        visited: &mut BTreeSet<UnitId>,
    ) -> Result<(), TroopError> {
        if !visited.insert(view.id) {
            return Ok(());
        }
        for promotion in &view.promotions {
            bump(&mut self.promotions, promotion);
        }
        for victory in &view.victories {
            bump(&mut self.victories_by_type, &victory.enemy.unit_type_display);
            bump(&mut self.victories_by_owner, &victory.enemy.owner_display);
            self.victory_count = self.victory_count.saturating_add(1);
        }
        self.history.extend(view.history.iter().map(|h| ReportHistoryLine {
            year: h.year,
            event_id: h.event_id,
            unit_name: view.name.clone(),
            text: h.text.clone(),
        }));

        let child_depth = depth.saturating_add(1);
        for sub in &view.subordinate_units {
            let Some(sub_view) = views.unit_view(*sub, year)? else {
                continue;
            };
            if visited.contains(sub) {
                continue;
            }
            self.subunits.push(SubunitLine {
                depth: child_depth,
                unit_id: *sub,
                name: sub_view.name.clone(),
            });
            self.collect(views, &sub_view, year, child_depth, visited)?;
        }
        Ok(())
    }
}

/// Strength summary, or `?` when a unit type is missing from the catalog.
fn summary_or_unknown(
    model: &StrengthModel<'_>,
    views: &dyn ViewSource,
    view: &UnitView,
    year: Option<i64>,
) -> Result<String, TroopError> {
    match model.summary(views, view, year) {
        Err(TroopError::NotFound { .. }) => Ok("?".to_owned()),
        other => other,
    }
}

fn bump(tally: &mut BTreeMap<String, usize>, key: &str) {
    let count = tally.entry(key.to_owned()).or_default();
    *count = count.saturating_add(1);
}

fn write_tally(f: &mut fmt::Formatter<'_>, tally: &BTreeMap<String, usize>) -> fmt::Result {
    for (key, count) in tally {
        writeln!(f, "\t{key}: {count}")?;
    }
    Ok(())
}

impl fmt::Display for UnitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let none = "<None>";
        writeln!(f, "Unit '{}'", self.view.name)?;
        writeln!(f, "------------------")?;
        writeln!(f, "TYPE          : {}", self.view.unit_type_display)?;
        writeln!(
            f,
            "COMPOSITE UNIT: {}",
            self.composite_name.as_deref().unwrap_or(none)
        )?;
        writeln!(f, "LOCATION      : {}", self.view.location)?;
        writeln!(
            f,
            "HEADQUARTERS  : {}",
            self.view.headquarters.as_deref().unwrap_or(none)
        )?;
        if let Some(strength) = &self.strength {
            writeln!(f, "STRENGTH      : {strength}")?;
        }
        if self.view.is_dead {
            let by = self.view.destroyed_by.as_ref().map_or_else(
                || "disbanded".to_owned(),
                |e| format!("destroyed by {} ({})", e.owner_display, e.unit_type_display),
            );
            writeln!(f, "STATUS        : {by}")?;
        }
        writeln!(f, "VICTORIES     : {}", self.victory_count)?;
        write_tally(f, &self.victories_by_type)?;
        write_tally(f, &self.victories_by_owner)?;
        writeln!(f, "PROMOTIONS    :")?;
        write_tally(f, &self.promotions)?;
        writeln!(f, "SUB UNITS     :")?;
        for line in &self.subunits {
            writeln!(f, "{}{}", "\t".repeat(line.depth), line.name)?;
        }
        writeln!(f, "HISTORY       :")?;
        for line in &self.history {
            writeln!(
                f,
                "\t{}: Unit {}. {} (event {})",
                line.year, line.unit_name, line.text, line.event_id
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// What to include in a roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterOptions {
    /// Cutoff year (`None` = latest).
    pub year: Option<i64>,
    /// Leave out units destroyed by the cutoff.
    pub live_only: bool,
    /// List every unit at depth 0 instead of nesting by composite.
    pub flat: bool,
}

/// One unit in a roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    /// Nesting depth (0 = top level).
    pub depth: usize,
    /// The unit.
    pub unit_id: UnitId,
    /// Name.
    pub name: String,
    /// Unit type display name.
    pub unit_type: String,
    /// Headquarters, if set.
    pub headquarters: Option<String>,
    /// Location.
    pub location: String,
    /// Strength summary (`?` when the unit type is not in the catalog).
    pub strength: String,
    /// Whether the unit is destroyed.
    pub is_dead: bool,
}

/// All units as of a year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    /// Rows in display order.
    pub rows: Vec<RosterRow>,
}

impl Roster {
    /// Build the roster from a manager's log.
    pub fn build<S: EventStore, C: ViewCache>(
        manager: &TroopManager<S, C>,
        strength: Option<&StrengthModel<'_>>,
        options: RosterOptions,
    ) -> Result<Self, TroopError> {
        let year = options.year;
        let mut views = BTreeMap::new();
        for unit_id in manager.get_unit_list(year, options.live_only)? {
            if let Some(view) = manager.get_unit_view(unit_id, year)? {
                views.insert(unit_id, view);
            }
        }

        let mut order: Vec<(usize, UnitId)> = Vec::with_capacity(views.len());
        if options.flat {
            order.extend(views.keys().map(|id| (0, *id)));
        } else {
            let mut placed = BTreeSet::new();
            let tops: Vec<UnitId> = views
                .values()
                .filter(|v| v.composite_unit_id.is_none_or(|p| !views.contains_key(&p)))
                .map(|v| v.id)
                .collect();
            for top in tops {
                nest(&views, top, 0, &mut placed, &mut order);
            }
            // Units only reachable through an assignment cycle.
            let stranded: Vec<UnitId> = views
                .keys()
                .filter(|id| !placed.contains(*id))
                .copied()
                .collect();
            for id in stranded {
                nest(&views, id, 0, &mut placed, &mut order);
            }
        }

        let mut rows = Vec::with_capacity(order.len());
        for (depth, unit_id) in order {
            let Some(view) = views.get(&unit_id) else {
                continue;
            };
            let strength = match strength {
                Some(model) => summary_or_unknown(model, manager, view, year)?,
                None => "-".to_owned(),
            };
            rows.push(RosterRow {
                depth,
                unit_id,
                name: view.name.clone(),
                unit_type: view.unit_type_display.clone(),
                headquarters: view.headquarters.clone(),
                location: view.location.clone(),
                strength,
                is_dead: view.is_dead,
            });
        }
        Ok(Self { rows })
    }
}

fn nest(
    views: &BTreeMap<UnitId, UnitView>,
    unit_id: UnitId,
    depth: usize,
    placed: &mut BTreeSet<UnitId>,
    order: &mut Vec<(usize, UnitId)>,
) {
    if !placed.insert(unit_id) {
        return;
    }
    order.push((depth, unit_id));
    let Some(view) = views.get(&unit_id) else {
        return;
    };
    for sub in &view.subordinate_units {
        if views.contains_key(sub) {
            nest(views, *sub, depth.saturating_add(1), placed, order);
        }
    }
}

impl fmt::Display for Roster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ID\tName\tType\tHQ\tLocation\tStrength")?;
        for row in &self.rows {
            writeln!(
                f,
                "{}\t{}{}{}\t{}\t{}\t{}\t{}",
                row.unit_id,
                "  ".repeat(row.depth),
                row.name,
                if row.is_dead { " (dead)" } else { "" },
                row.unit_type,
                row.headquarters.as_deref().unwrap_or("-"),
                row.location,
                row.strength
            )?;
        }
        Ok(())
    }
}
