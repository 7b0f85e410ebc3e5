//! # Compaction
//!
//! Keeps a node's [`DegreeMap`] near a size budget by replacing one concrete
//! property predicate with a wildcard at a time.
//!
//! A [`CompactionStrategy`] only proposes; the degree-caching node applies
//! the proposal, merging entries so that per-group weight totals are kept.

pub mod frequency;
pub mod threshold;

use std::fmt;

use crate::cache::DegreeMap;
use crate::model::ResolvedDirection;

pub use frequency::{estimate, ChangeFrequencies, PropertyChangeFrequency};
pub use threshold::ThresholdCompaction;

/// Wildcard `key` for every cached shape of one type and direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generalization {
    pub rel_type: String,
    pub direction: ResolvedDirection,
    pub key: String,
}

impl fmt::Display for Generalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}.{}", self.rel_type, self.direction, self.key)
    }
}

/// Decides when and how a degree map gets generalized.
pub trait CompactionStrategy: Send + Sync + fmt::Debug {
    /// One generalization to apply, or `None` when the map is within
    /// `threshold` or nothing is left to generalize.
    fn propose(
        &self,
        degrees: &DegreeMap,
        threshold: usize,
        frequencies: &ChangeFrequencies,
    ) -> Option<Generalization>;
}

/// Never compacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompaction;

impl CompactionStrategy for NoCompaction {
    fn propose(&self, _: &DegreeMap, _: usize, _: &ChangeFrequencies) -> Option<Generalization> {
        None
    }
}
