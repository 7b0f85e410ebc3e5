//! Counting by traversal.

use std::sync::Arc;

use async_trait::async_trait;

use super::RelationshipCounter;
use crate::config::RelationshipCountConfig;
use crate::description::RelationshipShape;
use crate::model::{Direction, NodeId, Relationship};
use crate::storage::StorageBackend;
use crate::cache::degree_map::add_weights;
use crate::Result;

/// Exact count from the node's live relationships.
#[derive(Debug, Clone)]
pub struct NaiveCounter {
    config: Arc<RelationshipCountConfig>,
}

impl NaiveCounter {
    pub fn new(config: Arc<RelationshipCountConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RelationshipCounter for NaiveCounter {
    async fn count<B: StorageBackend>(
        &self,
        backend: &B,
        tx: &B::Tx,
        node: NodeId,
        shape: &RelationshipShape,
    ) -> Result<i64> {
        let rels = backend
            .get_relationships(tx, node, Direction::from(shape.direction()), Some(shape.rel_type()))
            .await?;
        naive_count(&self.config, &rels, node, shape)
    }
}

/// Sum the weights of `rels` that match `shape` from `node`'s side.
///
/// `rels` are expected to touch `node`; a self-relationship counts for both
/// directions. Fails with [`crate::Error::WeightOverflow`] when the sum leaves `i64`.
pub fn naive_count(
    config: &RelationshipCountConfig,
    rels: &[Relationship],
    node: NodeId,
    shape: &RelationshipShape,
) -> Result<i64> {
    rels.iter()
        .filter(|rel| rel.rel_type == shape.rel_type())
        .filter(|rel| config.includes_relationship(rel))
        .filter(|rel| {
            rel.resolve_direction(node, shape.direction())
                .is_ok_and(|dir| dir == shape.direction())
        })
        .filter(|rel| shape.matches_properties(&config.visible_properties(rel)))
        .map(|rel| config.weighing().weight(rel, node).max(0))
        .try_fold(0, |total, weight| add_weights(total, weight, shape))
}
