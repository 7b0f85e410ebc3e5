//! Counting from persisted degrees.

use std::sync::Arc;

use async_trait::async_trait;

use super::RelationshipCounter;
use crate::config::RelationshipCountConfig;
use crate::description::RelationshipShape;
use crate::model::NodeId;
use crate::storage::StorageBackend;
use crate::{Error, Result};

/// Reads the node's cached degree map. Fails with
/// [`Error::UnableToCount`] when compaction wildcarded away a property the
/// query constrains.
#[derive(Debug, Clone)]
pub struct CachedCounter {
    config: Arc<RelationshipCountConfig>,
}

impl CachedCounter {
    pub fn new(config: Arc<RelationshipCountConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RelationshipCounter for CachedCounter {
    async fn count<B: StorageBackend>(
        &self,
        backend: &B,
        tx: &B::Tx,
        node: NodeId,
        shape: &RelationshipShape,
    ) -> Result<i64> {
        let found = backend
            .get_node(tx, node)
            .await?
            .ok_or_else(|| Error::NotFound(format!("node {node}")))?;

        let degrees = self
            .config
            .caching()
            .read_degrees(&found.properties, &self.config.key_prefix())?;
        degrees.count(shape)
    }
}
