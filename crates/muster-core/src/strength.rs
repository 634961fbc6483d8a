//! Combat strength of units and formations.
//!
//! A regular unit's strength is its type's base strength from the catalog.
//! A composite has none of its own: its aggregate is the sum over its
//! subordinates as of the same year, recursively.

use std::collections::BTreeSet;

use muster_types::{UnitId, UnitView};

use crate::catalog::GameCatalog;
use crate::error::TroopError;
use crate::view::ViewSource;

/// Strength calculations backed by a [`GameCatalog`].
#[derive(Debug, Clone)]
pub struct StrengthModel<'a> {
    catalog: &'a GameCatalog,
}

impl<'a> StrengthModel<'a> {
    /// Use `catalog` for base strengths.
    pub const fn new(catalog: &'a GameCatalog) -> Self {
        Self { catalog }
    }

    /// Base strength of a unit type.
    pub fn unit_type_strength(&self, unit_type: &str) -> Result<u64, TroopError> {
        self.catalog
            .unit_type(unit_type)
            .map(|record| u64::from(record.strength))
            .ok_or_else(|| TroopError::NotFound {
                what: "unit type",
                id: unit_type.to_owned(),
            })
    }

    /// Total strength: the sum of subordinates for a composite, the base
    /// strength otherwise.
    pub fn aggregate_strength(
        &self,
        views: &dyn ViewSource,
        view: &UnitView,
        year: Option<i64>,
    ) -> Result<u64, TroopError> {
        let mut visited = BTreeSet::new();
        self.aggregate(views, view, year, &mut visited)
    }

    /// Aggregate divided by the number of direct subordinates (0 for an
    /// empty composite); the base strength for a regular unit.
    pub fn average_strength(
        &self,
        views: &dyn ViewSource,
        view: &UnitView,
        year: Option<i64>,
    ) -> Result<f64, TroopError> {
        if !view.is_composite() {
            return Ok(self.unit_type_strength(&view.unit_type)? as f64);
        }
        let count = view.subordinate_units.len();
        if count == 0 {
            return Ok(0.0);
        }
        let total = self.aggregate_strength(views, view, year)?;
        Ok(total as f64 / count as f64)
    }

    /// One-line strength summary.
    ///
    /// Composites read `"<aggregate> (<average>/<subordinates>)"`; regular
    /// units read `"<strength>"` followed by one `+` per promotion.
    pub fn summary(
        &self,
        views: &dyn ViewSource,
        view: &UnitView,
        year: Option<i64>,
    ) -> Result<String, TroopError> {
        let total = self.aggregate_strength(views, view, year)?;
        if view.is_composite() {
            let average = self.average_strength(views, view, year)?;
            Ok(format!(
                "{total} ({average:.2}/{})",
                view.subordinate_units.len()
            ))
        } else {
            Ok(format!("{total}{}", "+".repeat(view.promotions.len())))
        }
    }

    fn aggregate(
        &self,
        views: &dyn ViewSource,
        view: &UnitView,
        year: Option<i64>,
        visited: &mut BTreeSet<UnitId>,
    ) -> Result<u64, TroopError> {
        if !visited.insert(view.id) {
            return Ok(0);
        }
        if !view.is_composite() {
            return self.unit_type_strength(&view.unit_type);
        }
        let mut total: u64 = 0;
        for sub in &view.subordinate_units {
            let Some(sub_view) = views.unit_view(*sub, year)? else {
                continue;
            };
            let strength = self.aggregate(views, &sub_view, year, visited)?;
            total = total.saturating_add(strength);
        }
        Ok(total)
    }
}
