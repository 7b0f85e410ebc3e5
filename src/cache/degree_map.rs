//! The aggregate cached for one node: shapes and their accumulated weights.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::description::RelationshipShape;
use crate::model::ResolvedDirection;
use crate::{Error, Result};

/// One cached shape and the total weight of the relationships it accounts for.
///
/// The shape is read as describing relationships whose visible property keys
/// are exactly the keys it mentions (see [`RelationshipShape::covers`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub shape: RelationshipShape,
    pub weight: i64,
}

impl CachedEntry {
    pub fn new(shape: RelationshipShape, weight: i64) -> Self {
        Self { shape, weight }
    }
}

/// Per-node degree cache contents.
///
/// No two entries have equal shapes, and no entry covers another, so any
/// concrete relationship is accounted for by at most one entry. Entries keep
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DegreeMap {
    entries: Vec<CachedEntry>,
}

impl DegreeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CachedEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[CachedEntry] {
        &self.entries
    }

    /// Weight stored under exactly this shape.
    pub fn get(&self, shape: &RelationshipShape) -> Option<i64> {
        self.entries.iter().find(|e| &e.shape == shape).map(|e| e.weight)
    }

    pub fn contains(&self, shape: &RelationshipShape) -> bool {
        self.get(shape).is_some()
    }

    /// Index of the entry accounting for relationships of `shape`.
    pub fn find_covering(&self, shape: &RelationshipShape) -> Option<usize> {
        self.entries.iter().position(|e| e.shape.covers(shape))
    }

    /// Sum of all weights stored for one relationship type and direction,
    /// saturating at `i64::MAX`.
    pub fn total_weight(&self, rel_type: &str, direction: ResolvedDirection) -> i64 {
        self.entries
            .iter()
            .filter(|e| e.shape.rel_type() == rel_type && e.shape.direction() == direction)
            .fold(0i64, |total, e| total.saturating_add(e.weight))
    }

    /// Build a map from persisted entries, merging equal shapes. Fails with
    /// [`Error::WeightOverflow`] when a merged weight leaves `i64`.
    pub fn try_from_entries(entries: impl IntoIterator<Item = CachedEntry>) -> Result<Self> {
        let mut map = DegreeMap::new();
        for entry in entries {
            map.add(entry.shape, entry.weight)?;
        }
        Ok(map)
    }

    /// Answer a degree query from the cached entries alone.
    ///
    /// Sums every entry the query fully includes. Fails with
    /// [`Error::UnableToCount`] when an entry has been generalized past what
    /// the query asks about, i.e. it is neither included nor excluded.
    pub fn count(&self, query: &RelationshipShape) -> Result<i64> {
        let mut total = 0;
        for entry in &self.entries {
            if query.includes_entry(&entry.shape) {
                total = add_weights(total, entry.weight, query)?;
            } else if !query.excludes_entry(&entry.shape) {
                return Err(Error::UnableToCount(format!(
                    "cached {} is too general to count {query}", entry.shape
                )));
            }
        }
        Ok(total)
    }

    pub(crate) fn entries_mut(&mut self) -> &mut Vec<CachedEntry> {
        &mut self.entries
    }

    /// Add weight to an equal-shaped entry, or append a new one.
    pub(crate) fn add(&mut self, shape: RelationshipShape, weight: i64) -> Result<()> {
        match self.entries.iter_mut().find(|e| e.shape == shape) {
            Some(entry) => entry.weight = add_weights(entry.weight, weight, &shape)?,
            None => self.entries.push(CachedEntry::new(shape, weight)),
        }
        Ok(())
    }

    /// Merge every entry covered by a different entry into the one covering it.
    pub(crate) fn normalize(&mut self) -> Result<()> {
        loop {
            let pair = self.entries.iter().enumerate().find_map(|(i, general)| {
                self.entries
                    .iter()
                    .enumerate()
                    .find(|(j, specific)| *j != i && general.shape.covers(&specific.shape))
                    .map(|(j, _)| (i, j))
            });

            let Some((into, from)) = pair else { break };
            let merged = self.entries[from].weight;
            let into_entry = &mut self.entries[into];
            into_entry.weight = add_weights(into_entry.weight, merged, &into_entry.shape)?;
            self.entries.remove(from);
        }
        Ok(())
    }
}

/// `a + b`, or [`Error::WeightOverflow`] naming what was being summed.
pub(crate) fn add_weights(a: i64, b: i64, what: impl fmt::Display) -> Result<i64> {
    a.checked_add(b)
        .ok_or_else(|| Error::WeightOverflow(format!("weight of {what} exceeds {}", i64::MAX)))
}

/// Merges equal shapes; merged weights saturate at `i64::MAX`. Use
/// [`DegreeMap::try_from_entries`] to detect overflow instead.
impl FromIterator<CachedEntry> for DegreeMap {
    fn from_iter<I: IntoIterator<Item = CachedEntry>>(iter: I) -> Self {
        let mut map = DegreeMap::new();
        for entry in iter {
            match map.entries.iter_mut().find(|e| e.shape == entry.shape) {
                Some(existing) => existing.weight = existing.weight.saturating_add(entry.weight),
                None => map.entries.push(entry),
            }
        }
        map
    }
}

impl<'a> IntoIterator for &'a DegreeMap {
    type Item = &'a CachedEntry;
    type IntoIter = std::slice::Iter<'a, CachedEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
