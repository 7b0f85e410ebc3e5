//! Relationship shapes: a type, a resolved direction, and property predicates.
//!
//! Shapes are immutable values. "Changing" one produces a new shape.
//!
//! Two readings of the same value are used:
//!
//! - As a **query**, keys the shape does not mention are unconstrained.
//!   [`RelationshipShape::generalizes`] is the partial order over queries.
//! - As a **cached entry**, a shape describes relationships whose visible
//!   keys are exactly the keys it mentions. [`RelationshipShape::covers`]
//!   is the order the degree cache uses to route a concrete relationship
//!   to the one entry that accounts for it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::PropertyPredicate;
use crate::model::{present, PropertyMap, ResolvedDirection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipShape {
    #[serde(rename = "type")]
    rel_type: String,
    direction: ResolvedDirection,
    predicates: BTreeMap<String, PropertyPredicate>,
}

impl RelationshipShape {
    /// The most specific shape of a relationship with these properties:
    /// one `Equals` per non-null property.
    pub fn literal(rel_type: impl Into<String>, direction: ResolvedDirection, props: &PropertyMap) -> Self {
        let predicates = props
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), PropertyPredicate::Equals(v.clone())))
            .collect();

        Self { rel_type: rel_type.into(), direction, predicates }
    }

    /// Every relationship of this type and direction.
    pub fn wildcard(rel_type: impl Into<String>, direction: ResolvedDirection) -> Self {
        Self { rel_type: rel_type.into(), direction, predicates: BTreeMap::new() }
    }

    /// Copy of this shape with `key` constrained by `predicate`.
    pub fn with(mut self, key: impl Into<String>, predicate: PropertyPredicate) -> Self {
        self.predicates.insert(key.into(), predicate);
        self
    }

    /// Copy of this shape with `key` unconstrained.
    pub fn without(mut self, key: &str) -> Self {
        self.predicates.remove(key);
        self
    }

    pub fn rel_type(&self) -> &str {
        &self.rel_type
    }

    pub fn direction(&self) -> ResolvedDirection {
        self.direction
    }

    pub fn predicates(&self) -> &BTreeMap<String, PropertyPredicate> {
        &self.predicates
    }

    pub fn get(&self, key: &str) -> Option<&PropertyPredicate> {
        self.predicates.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.predicates.keys().map(String::as_str)
    }

    /// Same relationship type and direction.
    pub fn same_group(&self, other: &RelationshipShape) -> bool {
        self.rel_type == other.rel_type && self.direction == other.direction
    }

    /// Does this shape match every relationship `other` matches?
    ///
    /// True iff both share type and direction and every predicate of
    /// `self` is also constrained in `other`, at least as tightly.
    pub fn generalizes(&self, other: &RelationshipShape) -> bool {
        self.same_group(other)
            && self.predicates.iter().all(|(key, general)| {
                other.predicates.get(key).is_some_and(|specific| specific.fits_within(general))
            })
    }

    /// `generalizes`, and not equal.
    pub fn is_strictly_more_general(&self, other: &RelationshipShape) -> bool {
        self != other && self.generalizes(other)
    }

    /// Both shapes mention the same keys and `self` generalizes `other`.
    ///
    /// Read as cached entries, every relationship counted by `other`
    /// would also be counted by `self`.
    pub fn covers(&self, other: &RelationshipShape) -> bool {
        self.predicates.len() == other.predicates.len()
            && self.predicates.keys().eq(other.predicates.keys())
            && self.generalizes(other)
    }

    /// No relationship can match both shapes.
    pub fn is_mutually_exclusive(&self, other: &RelationshipShape) -> bool {
        !self.same_group(other)
            || self.predicates.iter().any(|(key, p)| {
                other.predicates.get(key).is_some_and(|q| p.excludes(q))
            })
    }

    /// Does a relationship of this shape's group with `props` match?
    pub fn matches_properties(&self, props: &PropertyMap) -> bool {
        self.predicates
            .iter()
            .all(|(key, predicate)| predicate.matches(present(props, key)))
    }

    /// Does every relationship counted by the cached `entry` match this query?
    pub fn includes_entry(&self, entry: &RelationshipShape) -> bool {
        self.same_group(entry)
            && self.predicates.iter().all(|(key, query)| match entry.predicates.get(key) {
                Some(cached) => cached.fits_within(query),
                None => matches!(query, PropertyPredicate::Absent),
            })
    }

    /// Is no relationship counted by the cached `entry` matched by this query?
    pub fn excludes_entry(&self, entry: &RelationshipShape) -> bool {
        !self.same_group(entry)
            || self.predicates.iter().any(|(key, query)| match entry.predicates.get(key) {
                Some(cached) => cached.excludes(query),
                None => !matches!(query, PropertyPredicate::Absent),
            })
    }

    /// Replace `Equals` on `key` with `Any`. Other predicates are kept.
    pub fn generalize_key(&self, key: &str) -> RelationshipShape {
        let mut generalized = self.clone();
        if let Some(predicate) = generalized.predicates.get_mut(key) {
            if predicate.is_equals() {
                *predicate = PropertyPredicate::Any;
            }
        }
        generalized
    }

    /// Some predicate of this shape is `Any`.
    pub fn has_wildcards(&self) -> bool {
        self.predicates.values().any(PropertyPredicate::is_any)
    }
}

impl fmt::Display for RelationshipShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}{{", self.rel_type, self.direction)?;
        for (i, (key, predicate)) in self.predicates.iter().enumerate() {
            if i > 0 { write!(f, ", ")?; }
            write!(f, "{key}{predicate}")?;
        }
        write!(f, "}}")
    }
}
