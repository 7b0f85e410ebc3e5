//! # Property Graph Model
//!
//! Clean DTOs for the host property graph the degree cache observes.
//! These types cross every boundary: storage ↔ cache ↔ counters ↔ user.
//!
//! This module is pure data with no I/O.

pub mod node;
pub mod relationship;
pub mod value;
pub mod property_map;

pub use node::{Node, NodeId};
pub use relationship::{Relationship, RelId, Direction, ResolvedDirection};
pub use value::{Value, IsoDuration};
pub use property_map::{PropertyMap, properties, present};
