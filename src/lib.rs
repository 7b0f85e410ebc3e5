//! # neo4j-relcount: Relationship Degree Cache for Property Graphs
//!
//! Keeps, for every node, a space-bounded summary of how many relationships
//! of each shape touch it, updated as transactions commit.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `StorageBackend` is the contract between the cache and the host graph
//! 2. **Shapes are values**: `RelationshipShape` is immutable and ordered by generality
//! 3. **Bounded per node**: past a threshold, one property at a time is wildcarded
//! 4. **Typed precision**: the cached counter says `UnableToCount` instead of guessing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use neo4j_relcount::{Graph, PropertyMap, RelationshipShape, ResolvedDirection, TxMode};
//!
//! # async fn example() -> neo4j_relcount::Result<()> {
//! let graph = Graph::open_memory().await?;
//!
//! let mut tx = graph.begin(TxMode::ReadWrite).await?;
//! let ada = tx.create_node(&["Person"], PropertyMap::new()).await?;
//! let bob = tx.create_node(&["Person"], PropertyMap::new()).await?;
//! tx.create_relationship(ada, bob, "FOLLOWS", PropertyMap::new()).await?;
//! tx.commit().await?;
//!
//! let follows = RelationshipShape::wildcard("FOLLOWS", ResolvedDirection::Outgoing);
//! assert_eq!(graph.count(ada, &follows).await?, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! | Layer | Module | Description |
//! |-------|--------|-------------|
//! | Host model | `model`, `tx`, `storage` | Graph DTOs, transactions, `MemoryBackend` |
//! | Shapes | `description` | Predicates and the generality order |
//! | Cache | `cache`, `compact`, `weigh` | Per-node degrees, compaction, weights |
//! | Queries | `count` | Naive, cached and fallback counters |
//! | Integration | `config`, `module` | Settings, strategies, commit hook |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod tx;
pub mod description;
pub mod cache;
pub mod compact;
pub mod weigh;
pub mod count;
pub mod config;
pub mod module;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Node, Relationship, Value, PropertyMap,
    NodeId, RelId, Direction, ResolvedDirection,
    properties,
};

// ============================================================================
// Re-exports: Storage & transactions
// ============================================================================

pub use storage::{StorageBackend, MemoryBackend};
pub use tx::{Transaction, TransactionData, RelationshipChange, TxMode, TxId};

// ============================================================================
// Re-exports: Degree cache
// ============================================================================

pub use description::{PropertyPredicate, RelationshipShape};
pub use cache::{
    CachedEntry, DegreeMap, DegreeCachingNode, DegreeCache,
    DegreeCachingStrategy, NodePropertiesStrategy, SingleNodePropertyStrategy, DegreeWrites,
};
pub use compact::{
    ChangeFrequencies, PropertyChangeFrequency, CompactionStrategy,
    Generalization, ThresholdCompaction,
};
pub use weigh::{WeighingStrategy, OneForEach, PropertyWeight};
pub use count::{RelationshipCounter, NaiveCounter, CachedCounter, FallbackCounter};
pub use config::{RelationshipCountSettings, RelationshipCountConfig};
pub use module::RelationshipCountModule;

// ============================================================================
// Top-level Graph handle
// ============================================================================

/// The primary entry point. A `Graph` wraps a storage backend and keeps
/// relationship degrees up to date on every commit made through it.
pub struct Graph<B: StorageBackend> {
    backend: B,
    module: RelationshipCountModule,
}

impl<B: StorageBackend> Graph<B> {
    /// Create a Graph with the given backend and default settings.
    pub fn with_backend(backend: B) -> Self {
        Self { backend, module: RelationshipCountModule::default() }
    }

    /// Create a Graph with the given backend and configuration.
    pub fn with_config(backend: B, config: RelationshipCountConfig) -> Result<Self> {
        Ok(Self { backend, module: RelationshipCountModule::new(config)? })
    }

    /// Begin an explicit transaction.
    pub async fn begin(&self, mode: TxMode) -> Result<ExplicitTx<'_, B>> {
        let tx = self.backend.begin_tx(mode).await?;
        Ok(ExplicitTx { graph: self, tx })
    }

    /// Exact degree of `node`: from the cache when it is precise enough,
    /// by traversal otherwise.
    pub async fn count(&self, node: NodeId, shape: &RelationshipShape) -> Result<i64> {
        self.count_with(&self.module.fallback_counter(), node, shape).await
    }

    /// Degree of `node` from the cache alone.
    pub async fn count_cached(&self, node: NodeId, shape: &RelationshipShape) -> Result<i64> {
        self.count_with(&self.module.cached_counter(), node, shape).await
    }

    /// Degree of `node` by traversal.
    pub async fn count_naive(&self, node: NodeId, shape: &RelationshipShape) -> Result<i64> {
        self.count_with(&self.module.naive_counter(), node, shape).await
    }

    /// Count with any counter inside a read-only transaction.
    pub async fn count_with<C: RelationshipCounter>(
        &self,
        counter: &C,
        node: NodeId,
        shape: &RelationshipShape,
    ) -> Result<i64> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let result = counter.count(&self.backend, &tx, node, shape).await;
        self.backend.commit_tx(tx).await?;
        result
    }

    /// Rebuild every node's cached degrees from scratch.
    pub async fn initialize(&self) -> Result<usize> {
        self.module.initialize(&self.backend).await
    }

    /// Access the underlying backend (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn module(&self) -> &RelationshipCountModule {
        &self.module
    }
}

/// In-memory graph for testing and embedding.
impl Graph<storage::MemoryBackend> {
    pub async fn open_memory() -> Result<Self> {
        let backend = storage::MemoryBackend::new();
        Ok(Self::with_backend(backend))
    }
}

/// Explicit transaction handle. Degrees are updated only on `commit`;
/// dropping or rolling back discards them.
pub struct ExplicitTx<'g, B: StorageBackend> {
    graph: &'g Graph<B>,
    tx: B::Tx,
}

impl<'g, B: StorageBackend> ExplicitTx<'g, B> {
    pub async fn create_node(&mut self, labels: &[&str], props: PropertyMap) -> Result<NodeId> {
        self.graph.backend.create_node(&mut self.tx, labels, props).await
    }

    pub async fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        self.graph.backend.get_node(&self.tx, id).await
    }

    pub async fn delete_node(&mut self, id: NodeId) -> Result<bool> {
        self.graph.backend.delete_node(&mut self.tx, id).await
    }

    pub async fn detach_delete_node(&mut self, id: NodeId) -> Result<bool> {
        self.graph.backend.detach_delete_node(&mut self.tx, id).await
    }

    pub async fn set_node_property(&mut self, id: NodeId, key: &str, val: Value) -> Result<()> {
        self.graph.backend.set_node_property(&mut self.tx, id, key, val).await
    }

    pub async fn create_relationship(
        &mut self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId> {
        self.graph.backend.create_relationship(&mut self.tx, src, dst, rel_type, props).await
    }

    pub async fn get_relationship(&self, id: RelId) -> Result<Option<Relationship>> {
        self.graph.backend.get_relationship(&self.tx, id).await
    }

    pub async fn delete_relationship(&mut self, id: RelId) -> Result<bool> {
        self.graph.backend.delete_relationship(&mut self.tx, id).await
    }

    pub async fn set_relationship_property(&mut self, id: RelId, key: &str, val: Value) -> Result<()> {
        self.graph.backend.set_relationship_property(&mut self.tx, id, key, val).await
    }

    pub async fn remove_relationship_property(&mut self, id: RelId, key: &str) -> Result<()> {
        self.graph.backend.remove_relationship_property(&mut self.tx, id, key).await
    }

    /// The backend transaction, for calls not wrapped here.
    pub fn inner(&mut self) -> &mut B::Tx {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.graph.module.commit(&self.graph.backend, self.tx).await
    }

    pub async fn rollback(self) -> Result<()> {
        self.graph.backend.rollback_tx(self.tx).await
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The cache no longer reflects the graph and must be rebuilt.
    #[error("Degree cache needs initialization: {0}")]
    NeedsInitialization(String),

    /// The cache has been compacted past what the query asks about.
    #[error("Unable to count from cache: {0}")]
    UnableToCount(String),

    /// Accumulated relationship weights no longer fit in an `i64`.
    #[error("Weight overflow: {0}")]
    WeightOverflow(String),

    #[error("Degree cache session misuse: {0}")]
    SessionMisuse(String),

    #[error("Corrupt degree property {key}: {reason}")]
    CorruptDegree { key: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Semantic error: {0}")]
    SemanticError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The degree cache for the affected scope must be rebuilt before it can
    /// be trusted again.
    pub fn needs_initialization(&self) -> bool {
        matches!(self, Error::NeedsInitialization(_) | Error::CorruptDegree { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
