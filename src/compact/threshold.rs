//! Threshold-triggered compaction: generalize the most expendable property.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use super::{estimate, ChangeFrequencies, CompactionStrategy, Generalization};
use crate::cache::{CachedEntry, DegreeMap};
use crate::description::RelationshipShape;
use crate::model::ResolvedDirection;

/// Compacts once a node caches more shapes than the threshold.
///
/// Candidates are (type, direction, key) triples where `key` is still
/// `Equals` in some shape of the group. They are ranked by, in order:
///
/// 1. whether wildcarding the key merges any entries at all,
/// 2. the key's change frequency (table value, else an estimate),
/// 3. how many entries the generalization merges,
/// 4. the group's total weight,
/// 5. whether the group already holds an `Any` predicate.
///
/// Remaining ties go to the lexicographically first candidate. A key whose
/// generalization merges nothing never outranks one that merges, however
/// often it changes, so each step shrinks the map whenever it can.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdCompaction;

impl CompactionStrategy for ThresholdCompaction {
    fn propose(
        &self,
        degrees: &DegreeMap,
        threshold: usize,
        frequencies: &ChangeFrequencies,
    ) -> Option<Generalization> {
        if degrees.len() <= threshold {
            return None;
        }

        let mut groups: BTreeMap<(&str, ResolvedDirection), Vec<&CachedEntry>> = BTreeMap::new();
        for entry in degrees {
            groups
                .entry((entry.shape.rel_type(), entry.shape.direction()))
                .or_default()
                .push(entry);
        }

        let mut best: Option<Candidate<'_>> = None;
        for ((rel_type, direction), group) in &groups {
            let weight = group.iter().fold(0i64, |t, e| t.saturating_add(e.weight));
            let partially_generalized = group.iter().any(|e| e.shape.has_wildcards());

            for key in concrete_keys(group) {
                let candidate = Candidate {
                    rel_type: *rel_type,
                    direction: *direction,
                    key,
                    merges: merges_after(group, key),
                    frequency: frequencies
                        .get(rel_type, key)
                        .unwrap_or_else(|| estimate(group, key)),
                    weight,
                    partially_generalized,
                };
                trace!(candidate = ?candidate, "relcount.compaction.candidate");

                if best.as_ref().is_none_or(|b| candidate.rank(b) == Ordering::Greater) {
                    best = Some(candidate);
                }
            }
        }

        best.map(|c| Generalization {
            rel_type: c.rel_type.to_owned(),
            direction: c.direction,
            key: c.key.to_owned(),
        })
    }
}

#[derive(Debug)]
struct Candidate<'a> {
    rel_type: &'a str,
    direction: ResolvedDirection,
    key: &'a str,
    merges: usize,
    frequency: f64,
    weight: i64,
    partially_generalized: bool,
}

impl Candidate<'_> {
    fn rank(&self, other: &Candidate<'_>) -> Ordering {
        (self.merges > 0)
            .cmp(&(other.merges > 0))
            .then(self.frequency.total_cmp(&other.frequency))
            .then(self.merges.cmp(&other.merges))
            .then(self.weight.cmp(&other.weight))
            .then(self.partially_generalized.cmp(&other.partially_generalized))
    }
}

fn concrete_keys<'a>(group: &[&'a CachedEntry]) -> BTreeSet<&'a str> {
    group
        .iter()
        .flat_map(|e| e.shape.predicates().iter())
        .filter(|(_, p)| p.is_equals())
        .map(|(k, _)| k.as_str())
        .collect()
}

/// How many fewer entries the group would hold after wildcarding `key`.
fn merges_after(group: &[&CachedEntry], key: &str) -> usize {
    let mut shapes: Vec<RelationshipShape> = Vec::with_capacity(group.len());
    for entry in group {
        let generalized = entry.shape.generalize_key(key);
        if !shapes.contains(&generalized) {
            shapes.push(generalized);
        }
    }

    let covered = shapes
        .iter()
        .enumerate()
        .filter(|(j, s)| shapes.iter().enumerate().any(|(i, o)| i != *j && o.covers(s)))
        .count();

    group.len() - (shapes.len() - covered)
}
