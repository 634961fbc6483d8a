//! Cache of built unit views.
//!
//! A built view is tagged with two years:
//!
//! - `reflected_year`: the latest event year that influenced the view,
//!   including events of other units consulted while building it (the
//!   composite named by an `assign`, subordinate names and memberships).
//! - `horizon`: the cutoff the view was built for, `None` for "latest".
//!
//! A view built as of `H` is the right answer for any cutoff `Y` with
//! `reflected_year <= Y <= H`, because no consulted event falls in
//! `(reflected_year, Y]`. A view built for "latest" has no upper bound.
//! Writes remove affected entries, so whatever remains is consistent with
//! the log.

use std::collections::BTreeMap;

use muster_types::{UnitId, UnitView};

/// A built view with the years that bound its validity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedView {
    /// Latest event year folded into the view.
    pub reflected_year: i64,
    /// Cutoff the view was built for (`None` = latest).
    pub horizon: Option<i64>,
    /// The view itself.
    pub view: UnitView,
}

impl CachedView {
    /// Whether this entry answers a request for cutoff `year`.
    pub fn serves(&self, year: Option<i64>) -> bool {
        match (year, self.horizon) {
            (None, None) => true,
            (None, Some(_)) => false,
            (Some(y), None) => y >= self.reflected_year,
            (Some(y), Some(h)) => y >= self.reflected_year && y <= h,
        }
    }

    /// Whether this entry should replace `existing`.
    ///
    /// Newer reflected years win; on a tie the wider horizon wins.
    pub fn supersedes(&self, existing: &Self) -> bool {
        match self.reflected_year.cmp(&existing.reflected_year) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => match (self.horizon, existing.horizon) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(new), Some(old)) => new >= old,
            },
        }
    }
}

/// Storage for built views, injected into the troop manager.
pub trait ViewCache {
    /// A cached view valid for `year`, if any.
    fn lookup(&mut self, unit_id: UnitId, year: Option<i64>) -> Option<CachedView>;

    /// Offer a freshly built view. Implementations may decline to keep it.
    fn store(&mut self, unit_id: UnitId, entry: CachedView);

    /// Drop whatever is cached for `unit_id`.
    fn invalidate(&mut self, unit_id: UnitId);

    /// Drop everything.
    fn clear(&mut self);
}

impl<C: ViewCache + ?Sized> ViewCache for Box<C> {
    fn lookup(&mut self, unit_id: UnitId, year: Option<i64>) -> Option<CachedView> {
        (**self).lookup(unit_id, year)
    }

    fn store(&mut self, unit_id: UnitId, entry: CachedView) {
        (**self).store(unit_id, entry);
    }

    fn invalidate(&mut self, unit_id: UnitId) {
        (**self).invalidate(unit_id);
    }

    fn clear(&mut self) {
        (**self).clear();
    }
}

/// Counters kept by [`SnapshotCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that required a rebuild.
    pub misses: u64,
    /// Invalidation requests received.
    pub invalidations: u64,
    /// Full clears.
    pub clears: u64,
}

/// One snapshot per unit, keyed by unit id.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCache {
    entries: BTreeMap<UnitId, CachedView>,
    stats: CacheStats,
}

impl SnapshotCache {
    /// Create an empty cache.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            stats: CacheStats {
                hits: 0,
                misses: 0,
                invalidations: 0,
                clears: 0,
            },
        }
    }

    /// Hit, miss, and invalidation counters since creation.
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// The entry currently held for `unit_id`.
    pub fn entry(&self, unit_id: UnitId) -> Option<&CachedView> {
        self.entries.get(&unit_id)
    }

    /// Number of cached units.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ViewCache for SnapshotCache {
    fn lookup(&mut self, unit_id: UnitId, year: Option<i64>) -> Option<CachedView> {
        let found = self
            .entries
            .get(&unit_id)
            .filter(|entry| entry.serves(year))
            .cloned();
        if found.is_some() {
            self.stats.hits = self.stats.hits.saturating_add(1);
        } else {
            self.stats.misses = self.stats.misses.saturating_add(1);
        }
        found
    }

    fn store(&mut self, unit_id: UnitId, entry: CachedView) {
        let replace = self
            .entries
            .get(&unit_id)
            .is_none_or(|existing| entry.supersedes(existing));
        if replace {
            self.entries.insert(unit_id, entry);
        }
    }

    fn invalidate(&mut self, unit_id: UnitId) {
        self.stats.invalidations = self.stats.invalidations.saturating_add(1);
        if self.entries.remove(&unit_id).is_some() {
            tracing::trace!(unit_id = %unit_id, "view evicted");
        }
    }

    fn clear(&mut self) {
        self.stats.clears = self.stats.clears.saturating_add(1);
        self.entries.clear();
    }
}

/// A cache that never keeps anything. Every view is rebuilt from the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl ViewCache for NoCache {
    fn lookup(&mut self, _unit_id: UnitId, _year: Option<i64>) -> Option<CachedView> {
        None
    }

    fn store(&mut self, _unit_id: UnitId, _entry: CachedView) {}

    fn invalidate(&mut self, _unit_id: UnitId) {}

    fn clear(&mut self) {}
}
