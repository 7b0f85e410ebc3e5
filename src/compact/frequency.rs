//! Property change frequencies: how volatile a property's value is across
//! relationships of one type.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::cache::CachedEntry;
use crate::description::PropertyPredicate;
use crate::model::Value;

/// Observed fraction of relationships of `rel_type` whose `key` value differs
/// from relationship to relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChangeFrequency {
    pub rel_type: String,
    pub key: String,
    pub frequency: f64,
}

impl PropertyChangeFrequency {
    pub fn new(rel_type: impl Into<String>, key: impl Into<String>, frequency: f64) -> Self {
        Self { rel_type: rel_type.into(), key: key.into(), frequency }
    }
}

/// Lookup table of change frequencies, keyed by (type, property key).
///
/// Supplied from outside the cache. Values are clamped into `[0, 1]`;
/// NaN is stored as 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeFrequencies {
    table: HashMap<(String, String), f64>,
}

impl ChangeFrequencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, rel_type: impl Into<String>, key: impl Into<String>, frequency: f64) -> Self {
        self.set(rel_type, key, frequency);
        self
    }

    pub fn set(&mut self, rel_type: impl Into<String>, key: impl Into<String>, frequency: f64) {
        self.table.insert((rel_type.into(), key.into()), clamp(frequency));
    }

    pub fn get(&self, rel_type: &str, key: &str) -> Option<f64> {
        // Borrowed tuple lookups need owned keys; the table is small.
        self.table.get(&(rel_type.to_owned(), key.to_owned())).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Entries sorted by type then key.
    pub fn to_vec(&self) -> Vec<PropertyChangeFrequency> {
        let mut out: Vec<_> = self
            .table
            .iter()
            .map(|((t, k), f)| PropertyChangeFrequency::new(t.clone(), k.clone(), *f))
            .collect();
        out.sort_by(|a, b| (&a.rel_type, &a.key).cmp(&(&b.rel_type, &b.key)));
        out
    }
}

impl FromIterator<PropertyChangeFrequency> for ChangeFrequencies {
    fn from_iter<I: IntoIterator<Item = PropertyChangeFrequency>>(iter: I) -> Self {
        let mut table = ChangeFrequencies::new();
        for f in iter {
            table.set(f.rel_type, f.key, f.frequency);
        }
        table
    }
}

fn clamp(frequency: f64) -> f64 {
    if frequency.is_nan() { 0.0 } else { frequency.clamp(0.0, 1.0) }
}

/// Estimate a key's change frequency from one (type, direction) group of
/// cached entries.
///
/// Distinct values seen for `key`, plus one if some entry lacks it, plus the
/// weight already wildcarded on it, over the group's total weight plus one.
pub fn estimate(group: &[&CachedEntry], key: &str) -> f64 {
    let mut values: Vec<&Value> = Vec::new();
    let mut lacking = false;
    let mut wildcarded = 0i64;
    let mut total = 0i64;

    for entry in group {
        total = total.saturating_add(entry.weight);
        match entry.shape.get(key) {
            Some(PropertyPredicate::Equals(v)) => {
                if !values.iter().any(|seen| seen.identical(v)) {
                    values.push(v);
                }
            }
            Some(PropertyPredicate::Any) => wildcarded = wildcarded.saturating_add(entry.weight),
            Some(PropertyPredicate::Absent) | None => lacking = true,
        }
    }

    let distinct = values.len() as f64 + if lacking { 1.0 } else { 0.0 } + wildcarded as f64;
    clamp(distinct / (total as f64 + 1.0))
}
