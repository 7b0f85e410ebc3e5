//! # Relationship Counters
//!
//! Three ways to answer "how many relationships of this shape touch node N":
//!
//! | Counter | Source | Exact? |
//! |---------|--------|--------|
//! | [`NaiveCounter`] | traverses the node's relationships | always |
//! | [`CachedCounter`] | reads the node's persisted degrees | or fails with `UnableToCount` |
//! | [`FallbackCounter`] | cached, then naive on `UnableToCount` | always |
//!
//! All three apply the same inclusion and weighing policies, so they agree
//! whenever the cached counter answers.

pub mod cached;
pub mod fallback;
pub mod naive;

use async_trait::async_trait;

use crate::description::RelationshipShape;
use crate::model::NodeId;
use crate::storage::StorageBackend;
use crate::Result;

pub use cached::CachedCounter;
pub use fallback::FallbackCounter;
pub use naive::{naive_count, NaiveCounter};

/// Degree of `node` for relationships matching `shape`, read within `tx`.
#[async_trait]
pub trait RelationshipCounter: Send + Sync {
    async fn count<B: StorageBackend>(
        &self,
        backend: &B,
        tx: &B::Tx,
        node: NodeId,
        shape: &RelationshipShape,
    ) -> Result<i64>;
}
