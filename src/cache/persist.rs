//! Persisted form of a degree map: node properties under a reserved prefix.

use std::fmt;

use tracing::debug;

use super::{CachedEntry, DegreeMap};
use crate::description::RelationshipShape;
use crate::model::{NodeId, PropertyMap, Value};
use crate::{Error, Result};

/// Property writes that bring one node's persisted degrees up to date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DegreeWrites {
    pub node: NodeId,
    pub set: Vec<(String, Value)>,
    pub remove: Vec<String>,
}

impl DegreeWrites {
    pub fn new(node: NodeId) -> Self {
        Self { node, set: Vec::new(), remove: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }

    /// Apply to an in-memory property map.
    pub fn apply_to(&self, props: &mut PropertyMap) {
        for key in &self.remove {
            props.remove(key);
        }
        for (key, value) in &self.set {
            props.insert(key.clone(), value.clone());
        }
    }
}

/// Encodes a node's degree map into node properties and back.
///
/// Implementations only ever read or write keys starting with `prefix`.
pub trait DegreeCachingStrategy: Send + Sync + fmt::Debug {
    fn read_degrees(&self, props: &PropertyMap, prefix: &str) -> Result<DegreeMap>;

    /// Writes for a map whose `updated` shapes changed weight (or appeared)
    /// and whose `removed` shapes are gone since the last flush.
    fn write_degrees(
        &self,
        node: NodeId,
        degrees: &DegreeMap,
        updated: &[RelationshipShape],
        removed: &[RelationshipShape],
        prefix: &str,
    ) -> Result<DegreeWrites>;
}

/// Canonical JSON text of a shape. Predicate keys are ordered, so equal
/// shapes always encode to the same text.
pub fn encode_shape(shape: &RelationshipShape) -> Result<String> {
    Ok(serde_json::to_string(shape)?)
}

pub fn decode_shape(text: &str) -> Result<RelationshipShape> {
    Ok(serde_json::from_str(text)?)
}

fn corrupt(key: &str, reason: impl fmt::Display) -> Error {
    Error::CorruptDegree { key: key.to_owned(), reason: reason.to_string() }
}

fn check_weight(key: &str, weight: i64) -> Result<i64> {
    if weight > 0 { Ok(weight) } else { Err(corrupt(key, format!("non-positive weight {weight}"))) }
}

// ============================================================================
// One property per shape
// ============================================================================

/// One node property per cached shape: `prefix + encode_shape(shape)`
/// holding the weight as an integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodePropertiesStrategy;

impl DegreeCachingStrategy for NodePropertiesStrategy {
    fn read_degrees(&self, props: &PropertyMap, prefix: &str) -> Result<DegreeMap> {
        let mut keys: Vec<&String> = props.keys().filter(|k| k.starts_with(prefix)).collect();
        keys.sort();

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let shape = decode_shape(&key[prefix.len()..]).map_err(|e| corrupt(key, e))?;
            let weight = match &props[key] {
                Value::Int(w) => check_weight(key, *w)?,
                other => return Err(corrupt(key, format!("expected INTEGER, got {}", other.type_name()))),
            };
            entries.push(CachedEntry::new(shape, weight));
        }
        DegreeMap::try_from_entries(entries)
    }

    fn write_degrees(
        &self,
        node: NodeId,
        degrees: &DegreeMap,
        updated: &[RelationshipShape],
        removed: &[RelationshipShape],
        prefix: &str,
    ) -> Result<DegreeWrites> {
        let mut writes = DegreeWrites::new(node);
        for shape in removed {
            writes.remove.push(format!("{prefix}{}", encode_shape(shape)?));
        }
        for shape in updated {
            if let Some(weight) = degrees.get(shape) {
                writes.set.push((format!("{prefix}{}", encode_shape(shape)?), Value::Int(weight)));
            }
        }
        Ok(writes)
    }
}

// ============================================================================
// Whole map in one property
// ============================================================================

/// The whole map as one JSON string under `prefix + "DEGREES"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleNodePropertyStrategy;

impl SingleNodePropertyStrategy {
    pub const KEY: &'static str = "DEGREES";
}

impl DegreeCachingStrategy for SingleNodePropertyStrategy {
    fn read_degrees(&self, props: &PropertyMap, prefix: &str) -> Result<DegreeMap> {
        let key = format!("{prefix}{}", Self::KEY);
        let Some(value) = props.get(&key) else {
            return Ok(DegreeMap::new());
        };
        let Value::String(json) = value else {
            return Err(corrupt(&key, format!("expected STRING, got {}", value.type_name())));
        };

        let entries: Vec<CachedEntry> = serde_json::from_str(json).map_err(|e| corrupt(&key, e))?;
        for entry in &entries {
            check_weight(&key, entry.weight)?;
        }
        DegreeMap::try_from_entries(entries)
    }

    fn write_degrees(
        &self,
        node: NodeId,
        degrees: &DegreeMap,
        updated: &[RelationshipShape],
        removed: &[RelationshipShape],
        prefix: &str,
    ) -> Result<DegreeWrites> {
        let mut writes = DegreeWrites::new(node);
        if updated.is_empty() && removed.is_empty() {
            return Ok(writes);
        }

        let key = format!("{prefix}{}", Self::KEY);
        if degrees.is_empty() {
            writes.remove.push(key);
        } else {
            let json = serde_json::to_string(degrees)?;
            debug!(node = %node, bytes = json.len(), "relcount.persist.single");
            writes.set.push((key, Value::String(json)));
        }
        Ok(writes)
    }
}
