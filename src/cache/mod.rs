//! # Degree Cache
//!
//! Per-node relationship degrees, kept in step with committed changes.
//!
//! | Type | Role |
//! |------|------|
//! | [`DegreeMap`] | Shapes and accumulated weights for one node |
//! | [`DegreeCachingNode`] | Increment, decrement, compaction and flush for one node |
//! | [`DegreeCache`] | The start/end bracket around one transaction |
//! | [`DegreeCachingStrategy`] | Encoding of a degree map into node properties |

pub mod degree_map;
pub mod node;
pub mod persist;
pub mod session;

pub use degree_map::{CachedEntry, DegreeMap};
pub use node::DegreeCachingNode;
pub use persist::{
    decode_shape, encode_shape, DegreeCachingStrategy, DegreeWrites, NodePropertiesStrategy,
    SingleNodePropertyStrategy,
};
pub use session::DegreeCache;
