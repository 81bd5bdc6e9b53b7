//! Short-term memory of abandoned placements.

use std::collections::HashMap;

use crate::solution::Assignment;

/// A `(patient, ward, day)` placement recorded as tabu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TabuAttribute {
    pub patient: usize,
    pub ward: usize,
    pub day: usize,
}

impl From<Assignment> for TabuAttribute {
    fn from(a: Assignment) -> Self {
        Self {
            patient: a.patient,
            ward: a.ward,
            day: a.day,
        }
    }
}

/// Tabu list keyed by attribute, valued by expiry iteration.
///
/// An attribute forbidden at iteration `k` stays tabu for iterations
/// `k + 1 ..= k + tenure`. Expired entries are dropped lazily by
/// [`purge`](Self::purge) and never consulted before that.
#[derive(Debug, Clone)]
pub struct TabuMemory {
    tenure: usize,
    entries: HashMap<TabuAttribute, usize>,
}

impl TabuMemory {
    pub fn new(tenure: usize) -> Self {
        Self {
            tenure,
            entries: HashMap::new(),
        }
    }

    #[inline]
    pub fn tenure(&self) -> usize {
        self.tenure
    }

    /// Whether re-entering `attribute` at `iteration` is forbidden.
    #[inline]
    pub fn is_tabu(&self, attribute: &TabuAttribute, iteration: usize) -> bool {
        self.entries
            .get(attribute)
            .is_some_and(|&expiry| iteration <= expiry)
    }

    /// Records `attribute`, abandoned at `iteration`.
    pub fn forbid(&mut self, attribute: TabuAttribute, iteration: usize) {
        self.entries.insert(attribute, iteration + self.tenure);
    }

    /// Drops entries that can no longer be tabu at `iteration` or later.
    pub fn purge(&mut self, iteration: usize) {
        self.entries.retain(|_, expiry| *expiry >= iteration);
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
