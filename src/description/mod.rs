//! # Relationship Descriptions
//!
//! Value types describing relationship patterns, from fully concrete
//! (one `Equals` per property) to fully wildcarded (type and direction only).
//! Pure data with a generality partial order; no I/O.

pub mod predicate;
pub mod shape;

pub use predicate::PropertyPredicate;
pub use shape::RelationshipShape;
