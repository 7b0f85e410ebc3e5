//! # Relationship Count Module
//!
//! Hooks the degree cache into a host graph engine.
//!
//! - Before a transaction commits, its relationship changes are replayed
//!   through one [`DegreeCache`] bracket and the resulting degree writes are
//!   applied inside the same transaction.
//! - [`RelationshipCountModule::initialize`] rebuilds every node's degrees
//!   from a full scan. It is also how the module recovers when a commit finds
//!   the cache out of sync.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{DegreeCache, DegreeWrites};
use crate::config::RelationshipCountConfig;
use crate::count::{CachedCounter, FallbackCounter, NaiveCounter};
use crate::model::{Direction, Node, NodeId, Relationship, ResolvedDirection};
use crate::storage::StorageBackend;
use crate::tx::{RelationshipChange, Transaction, TransactionData, TxMode};
use crate::Result;

#[derive(Debug, Clone)]
pub struct RelationshipCountModule {
    config: Arc<RelationshipCountConfig>,
}

impl Default for RelationshipCountModule {
    fn default() -> Self {
        Self { config: Arc::new(RelationshipCountConfig::default()) }
    }
}

#[derive(Clone, Copy)]
enum Event {
    Created,
    Deleted,
}

impl RelationshipCountModule {
    pub fn new(config: RelationshipCountConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config: Arc::new(config) })
    }

    pub fn config(&self) -> &Arc<RelationshipCountConfig> {
        &self.config
    }

    pub fn naive_counter(&self) -> NaiveCounter {
        NaiveCounter::new(Arc::clone(&self.config))
    }

    pub fn cached_counter(&self) -> CachedCounter {
        CachedCounter::new(Arc::clone(&self.config))
    }

    pub fn fallback_counter(&self) -> FallbackCounter {
        FallbackCounter::new(Arc::clone(&self.config))
    }

    // ========================================================================
    // Transaction hook
    // ========================================================================

    /// Replay `tx`'s relationship changes and write the updated degrees
    /// into `tx`. On error nothing is written.
    pub async fn before_commit<B: StorageBackend>(&self, backend: &B, tx: &mut B::Tx) -> Result<()> {
        let data = tx.data().clone();
        if data.is_empty() {
            return Ok(());
        }

        let mut cache = DegreeCache::new(Arc::clone(&self.config));
        cache.start_caching()?;

        if let Err(e) = self.replay(backend, tx, &data, &mut cache).await {
            cache.abandon();
            return Err(e);
        }

        let writes = cache.end_caching()?;
        apply_writes(backend, tx, &writes).await
    }

    /// Commit `tx` with its degree updates.
    ///
    /// When the cache turns out to be out of sync, the transaction still
    /// commits and every node's degrees are rebuilt. Any other failure rolls
    /// the transaction back.
    pub async fn commit<B: StorageBackend>(&self, backend: &B, mut tx: B::Tx) -> Result<()> {
        match self.before_commit(backend, &mut tx).await {
            Ok(()) => backend.commit_tx(tx).await,
            Err(e) if e.needs_initialization() => {
                warn!(tx = %tx.id(), error = %e, "relcount.commit.needs_initialization");
                backend.commit_tx(tx).await?;
                self.reinitialize(backend).await.map(|_| ())
            }
            Err(e) => {
                let id = tx.id();
                if let Err(rollback) = backend.rollback_tx(tx).await {
                    warn!(tx = %id, error = %rollback, "relcount.commit.rollback_failed");
                }
                Err(e)
            }
        }
    }

    async fn replay<B: StorageBackend>(
        &self,
        backend: &B,
        tx: &B::Tx,
        data: &TransactionData,
        cache: &mut DegreeCache,
    ) -> Result<()> {
        let mut snapshots: HashMap<NodeId, Option<Node>> = HashMap::new();

        for change in data.changes() {
            match change {
                RelationshipChange::Created(rel) => {
                    self.feed(backend, tx, data, cache, &mut snapshots, rel, Event::Created).await?;
                }
                RelationshipChange::Deleted(rel) => {
                    self.feed(backend, tx, data, cache, &mut snapshots, rel, Event::Deleted).await?;
                }
                RelationshipChange::Updated { before, after } => {
                    self.feed(backend, tx, data, cache, &mut snapshots, before, Event::Deleted).await?;
                    self.feed(backend, tx, data, cache, &mut snapshots, after, Event::Created).await?;
                }
            }
        }
        Ok(())
    }

    /// Hand one relationship event to the cache, once per live endpoint.
    #[allow(clippy::too_many_arguments)]
    async fn feed<B: StorageBackend>(
        &self,
        backend: &B,
        tx: &B::Tx,
        data: &TransactionData,
        cache: &mut DegreeCache,
        snapshots: &mut HashMap<NodeId, Option<Node>>,
        rel: &Relationship,
        event: Event,
    ) -> Result<()> {
        if !self.config.includes_relationship(rel) {
            return Ok(());
        }

        for (pov, default) in [(rel.src, ResolvedDirection::Incoming), (rel.dst, ResolvedDirection::Outgoing)] {
            if data.has_been_deleted(pov) {
                continue;
            }
            if !snapshots.contains_key(&pov) {
                let node = backend.get_node(tx, pov).await?;
                snapshots.insert(pov, node);
            }
            let Some(node) = snapshots.get(&pov).and_then(Option::as_ref) else {
                debug!(node = %pov, rel = %rel.id, "relcount.replay.node_missing");
                continue;
            };

            match event {
                Event::Created => cache.handle_created(rel, node, default)?,
                Event::Deleted => cache.handle_deleted(rel, node, default)?,
            }
        }
        Ok(())
    }

    // ========================================================================
    // Full rebuild
    // ========================================================================

    /// Rebuild the degrees of every node from its relationships, replacing
    /// whatever was stored under the module's prefix. Returns the number of
    /// nodes processed.
    pub async fn initialize<B: StorageBackend>(&self, backend: &B) -> Result<usize> {
        let mut tx = backend.begin_tx(TxMode::ReadWrite).await?;
        match self.rebuild(backend, &mut tx).await {
            Ok(nodes) => {
                backend.commit_tx(tx).await?;
                info!(nodes, prefix = %self.config.key_prefix(), "relcount.initialize");
                Ok(nodes)
            }
            Err(e) => {
                backend.rollback_tx(tx).await?;
                Err(e)
            }
        }
    }

    /// Recover from an out-of-sync cache.
    pub async fn reinitialize<B: StorageBackend>(&self, backend: &B) -> Result<usize> {
        warn!(prefix = %self.config.key_prefix(), "relcount.reinitialize");
        self.initialize(backend).await
    }

    /// Remove every degree property this module stored. Returns the number of
    /// properties removed.
    pub async fn clear<B: StorageBackend>(&self, backend: &B) -> Result<usize> {
        let prefix = self.config.key_prefix();
        let mut tx = backend.begin_tx(TxMode::ReadWrite).await?;
        let mut removed = 0;
        for node in backend.all_nodes(&tx).await? {
            for key in node.keys_with_prefix(&prefix) {
                backend.remove_node_property(&mut tx, node.id, &key).await?;
                removed += 1;
            }
        }
        backend.commit_tx(tx).await?;
        debug!(removed, "relcount.clear");
        Ok(removed)
    }

    async fn rebuild<B: StorageBackend>(&self, backend: &B, tx: &mut B::Tx) -> Result<usize> {
        let prefix = self.config.key_prefix();
        let nodes = backend.all_nodes(tx).await?;

        for node in &nodes {
            let stale = node.keys_with_prefix(&prefix);
            for key in &stale {
                backend.remove_node_property(tx, node.id, key).await?;
            }

            let mut fresh = node.clone();
            fresh.properties.retain(|k, _| !k.starts_with(&prefix));

            let rels = backend.get_relationships(tx, node.id, Direction::Both, None).await?;
            let writes = self.rebuild_node(&fresh, &rels)?;
            apply_writes(backend, tx, &writes).await?;
        }
        Ok(nodes.len())
    }

    fn rebuild_node(&self, node: &Node, rels: &[Relationship]) -> Result<Vec<DegreeWrites>> {
        let mut cache = DegreeCache::new(Arc::clone(&self.config));
        cache.start_caching()?;

        let fed = rels
            .iter()
            .filter(|rel| self.config.includes_relationship(rel))
            .try_for_each(|rel| -> Result<()> {
                cache.handle_created(rel, node, ResolvedDirection::Outgoing)?;
                if rel.is_loop() {
                    cache.handle_created(rel, node, ResolvedDirection::Incoming)?;
                }
                Ok(())
            });

        if let Err(e) = fed {
            cache.abandon();
            return Err(e);
        }
        cache.end_caching()
    }
}

async fn apply_writes<B: StorageBackend>(backend: &B, tx: &mut B::Tx, writes: &[DegreeWrites]) -> Result<()> {
    for write in writes {
        for key in &write.remove {
            backend.remove_node_property(tx, write.node, key).await?;
        }
        for (key, value) in &write.set {
            backend.set_node_property(tx, write.node, key, value.clone()).await?;
        }
    }
    Ok(())
}
