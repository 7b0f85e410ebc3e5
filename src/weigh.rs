//! Weighing strategies: how much one relationship contributes to a degree.

use crate::model::{present, NodeId, Relationship, Value};

/// Weight of `rel` as seen from `pov`.
///
/// The default counts every relationship once. A weight of zero means the
/// relationship does not contribute; negative weights are treated the same.
pub trait WeighingStrategy: Send + Sync {
    fn weight(&self, rel: &Relationship, pov: NodeId) -> i64;
}

impl<F> WeighingStrategy for F
where
    F: Fn(&Relationship, NodeId) -> i64 + Send + Sync,
{
    fn weight(&self, rel: &Relationship, pov: NodeId) -> i64 {
        self(rel, pov)
    }
}

/// Every relationship weighs 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneForEach;

impl WeighingStrategy for OneForEach {
    fn weight(&self, _: &Relationship, _: NodeId) -> i64 {
        1
    }
}

/// Weight read from an integer relationship property.
///
/// Floats are truncated. Missing or non-numeric values weigh `default`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyWeight {
    pub key: String,
    pub default: i64,
}

impl PropertyWeight {
    pub fn new(key: impl Into<String>, default: i64) -> Self {
        Self { key: key.into(), default }
    }
}

impl WeighingStrategy for PropertyWeight {
    fn weight(&self, rel: &Relationship, _: NodeId) -> i64 {
        match present(&rel.properties, &self.key) {
            Some(Value::Int(i)) => *i,
            Some(Value::Float(f)) if f.is_finite() => *f as i64,
            _ => self.default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RelId;

    fn rel() -> Relationship {
        Relationship::new(RelId(1), NodeId(1), NodeId(2), "FRIEND_OF")
    }

    #[test]
    fn test_one_for_each() {
        assert_eq!(OneForEach.weight(&rel(), NodeId(1)), 1);
    }

    #[test]
    fn test_property_weight() {
        let strength = PropertyWeight::new("strength", 1);
        assert_eq!(strength.weight(&rel().with_property("strength", 3), NodeId(1)), 3);
        assert_eq!(strength.weight(&rel().with_property("strength", 2.7), NodeId(1)), 2);
        assert_eq!(strength.weight(&rel().with_property("strength", "high"), NodeId(1)), 1);
        assert_eq!(strength.weight(&rel().with_property("strength", Value::Null), NodeId(1)), 1);
        assert_eq!(strength.weight(&rel(), NodeId(1)), 1);
    }

    #[test]
    fn test_closure_strategy() {
        let outgoing_only = |r: &Relationship, pov: NodeId| if r.src == pov { 2 } else { 0 };
        assert_eq!(outgoing_only.weight(&rel(), NodeId(1)), 2);
        assert_eq!(outgoing_only.weight(&rel(), NodeId(2)), 0);
    }
}
