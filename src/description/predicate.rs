//! Constraints on a single property key.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::Value;

/// What a relationship shape demands of one property key.
///
/// Keys a shape does not mention are unconstrained. `Any` is stricter
/// than that: the property must be present, whatever its value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum PropertyPredicate {
    /// Present with exactly this value.
    Equals(Value),
    /// Present with any value.
    Any,
    /// Not present.
    Absent,
}

impl PropertyPredicate {
    pub fn equal_to(value: impl Into<Value>) -> Self {
        PropertyPredicate::Equals(value.into())
    }

    pub fn is_equals(&self) -> bool {
        matches!(self, PropertyPredicate::Equals(_))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, PropertyPredicate::Any)
    }

    /// Does a property in this state satisfy the predicate?
    /// `None` means the property is absent.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (PropertyPredicate::Equals(expected), Some(actual)) => expected.identical(actual),
            (PropertyPredicate::Any, Some(_)) => true,
            (PropertyPredicate::Absent, None) => true,
            _ => false,
        }
    }

    /// Is every property state satisfying `self` also satisfying `general`?
    pub fn fits_within(&self, general: &PropertyPredicate) -> bool {
        match (self, general) {
            (PropertyPredicate::Equals(a), PropertyPredicate::Equals(b)) => a.identical(b),
            (PropertyPredicate::Equals(_) | PropertyPredicate::Any, PropertyPredicate::Any) => true,
            (PropertyPredicate::Absent, PropertyPredicate::Absent) => true,
            _ => false,
        }
    }

    /// No property state satisfies both predicates.
    pub fn excludes(&self, other: &PropertyPredicate) -> bool {
        match (self, other) {
            (PropertyPredicate::Equals(a), PropertyPredicate::Equals(b)) => !a.identical(b),
            (PropertyPredicate::Absent, PropertyPredicate::Absent) => false,
            (PropertyPredicate::Absent, _) | (_, PropertyPredicate::Absent) => true,
            _ => false,
        }
    }
}

impl PartialEq for PropertyPredicate {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropertyPredicate::Equals(a), PropertyPredicate::Equals(b)) => a.identical(b),
            (PropertyPredicate::Any, PropertyPredicate::Any) => true,
            (PropertyPredicate::Absent, PropertyPredicate::Absent) => true,
            _ => false,
        }
    }
}

// `identical` is reflexive, so equality is total.
impl Eq for PropertyPredicate {}

impl fmt::Display for PropertyPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyPredicate::Equals(v) => write!(f, "={v}"),
            PropertyPredicate::Any => write!(f, "=*"),
            PropertyPredicate::Absent => write!(f, " IS NULL"),
        }
    }
}
