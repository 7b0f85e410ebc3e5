//! Cached counting with a traversal fallback.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{CachedCounter, NaiveCounter, RelationshipCounter};
use crate::config::RelationshipCountConfig;
use crate::description::RelationshipShape;
use crate::model::NodeId;
use crate::storage::StorageBackend;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct FallbackCounter {
    cached: CachedCounter,
    naive: NaiveCounter,
}

impl FallbackCounter {
    pub fn new(config: Arc<RelationshipCountConfig>) -> Self {
        Self {
            cached: CachedCounter::new(Arc::clone(&config)),
            naive: NaiveCounter::new(config),
        }
    }
}

#[async_trait]
impl RelationshipCounter for FallbackCounter {
    async fn count<B: StorageBackend>(
        &self,
        backend: &B,
        tx: &B::Tx,
        node: NodeId,
        shape: &RelationshipShape,
    ) -> Result<i64> {
        match self.cached.count(backend, tx, node, shape).await {
            Err(Error::UnableToCount(reason)) => {
                warn!(node = %node, shape = %shape, reason = %reason, "relcount.count.fallback");
                self.naive.count(backend, tx, node, shape).await
            }
            other => other,
        }
    }
}
