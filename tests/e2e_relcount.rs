//! End-to-end tests for degree caching through committed transactions.
//!
//! Each test drives a `Graph` over `MemoryBackend`: mutations go through
//! explicit transactions, degrees are read back from node properties and
//! through the three counters.

use neo4j_relcount::{
    properties, DegreeMap, Error, Graph, MemoryBackend, NodeId, PropertyMap, PropertyPredicate,
    PropertyWeight, Relationship, RelationshipCountConfig, RelationshipShape,
    ResolvedDirection, SingleNodePropertyStrategy, StorageBackend, TxMode, Value,
};
use pretty_assertions::assert_eq;

use ResolvedDirection::{Incoming, Outgoing};

// ============================================================================
// Helpers
// ============================================================================

fn follows(direction: ResolvedDirection) -> RelationshipShape {
    RelationshipShape::wildcard("FOLLOWS", direction)
}

fn strength(direction: ResolvedDirection, v: i64) -> RelationshipShape {
    follows(direction).with("strength", PropertyPredicate::equal_to(v))
}

async fn degrees(graph: &Graph<MemoryBackend>, node: NodeId) -> DegreeMap {
    let tx = graph.begin(TxMode::ReadOnly).await.unwrap();
    let found = tx.get_node(node).await.unwrap().unwrap();
    let config = graph.module().config();
    config.caching().read_degrees(&found.properties, &config.key_prefix()).unwrap()
}

async fn degree_keys(graph: &Graph<MemoryBackend>, node: NodeId) -> Vec<String> {
    let tx = graph.begin(TxMode::ReadOnly).await.unwrap();
    let found = tx.get_node(node).await.unwrap().unwrap();
    found.keys_with_prefix(&graph.module().config().key_prefix())
}

async fn nodes(graph: &Graph<MemoryBackend>, n: usize) -> Vec<NodeId> {
    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    let mut ids = Vec::with_capacity(n);
    for _ in 0..n {
        ids.push(tx.create_node(&["Person"], PropertyMap::new()).await.unwrap());
    }
    tx.commit().await.unwrap();
    ids
}

// ============================================================================
// 1. Created relationships are cached for both endpoints
// ============================================================================

#[tokio::test]
async fn test_created_relationships_cached_on_both_ends() {
    let graph = Graph::open_memory().await.unwrap();
    let ids = nodes(&graph, 4).await;
    let (n, others) = (ids[0], &ids[1..]);

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    for (other, s) in others.iter().zip([1, 1, 2]) {
        tx.create_relationship(n, *other, "FOLLOWS", properties([("strength", s)]))
            .await
            .unwrap();
    }
    tx.commit().await.unwrap();

    let cached = degrees(&graph, n).await;
    assert_eq!(cached.len(), 2);
    assert_eq!(cached.get(&strength(Outgoing, 1)), Some(2));
    assert_eq!(cached.get(&strength(Outgoing, 2)), Some(1));
    assert_eq!(degrees(&graph, others[0]).await.get(&strength(Incoming, 1)), Some(1));

    assert_eq!(graph.count_naive(n, &follows(Outgoing)).await.unwrap(), 3);
    assert_eq!(graph.count_cached(n, &follows(Outgoing)).await.unwrap(), 3);
    assert_eq!(graph.count_cached(n, &strength(Outgoing, 1)).await.unwrap(), 2);
    assert_eq!(graph.count_cached(n, &follows(Incoming)).await.unwrap(), 0);
    assert_eq!(graph.count(others[2], &strength(Incoming, 2)).await.unwrap(), 1);
}

// ============================================================================
// 2. Deleting relationships removes their degrees
// ============================================================================

#[tokio::test]
async fn test_deleted_relationship_removes_degree() {
    let graph = Graph::open_memory().await.unwrap();
    let ids = nodes(&graph, 2).await;

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    let rel = tx
        .create_relationship(ids[0], ids[1], "FOLLOWS", properties([("strength", 1)]))
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(degree_keys(&graph, ids[0]).await.len(), 1);

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    assert!(tx.delete_relationship(rel).await.unwrap());
    tx.commit().await.unwrap();

    assert!(degree_keys(&graph, ids[0]).await.is_empty());
    assert!(degree_keys(&graph, ids[1]).await.is_empty());
    assert_eq!(graph.count_cached(ids[0], &strength(Outgoing, 1)).await.unwrap(), 0);
    assert_eq!(graph.count_naive(ids[0], &strength(Outgoing, 1)).await.unwrap(), 0);
}

#[tokio::test]
async fn test_create_and_delete_in_one_transaction() {
    let graph = Graph::open_memory().await.unwrap();
    let ids = nodes(&graph, 2).await;

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    let rel = tx.create_relationship(ids[0], ids[1], "FOLLOWS", PropertyMap::new()).await.unwrap();
    tx.delete_relationship(rel).await.unwrap();
    tx.commit().await.unwrap();

    assert!(degree_keys(&graph, ids[0]).await.is_empty());
}

#[tokio::test]
async fn test_detach_delete_updates_surviving_endpoint() {
    let graph = Graph::open_memory().await.unwrap();
    let ids = nodes(&graph, 3).await;

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    tx.create_relationship(ids[0], ids[1], "FOLLOWS", PropertyMap::new()).await.unwrap();
    tx.create_relationship(ids[2], ids[1], "FOLLOWS", PropertyMap::new()).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(graph.count_cached(ids[1], &follows(Incoming)).await.unwrap(), 2);

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    assert!(tx.detach_delete_node(ids[0]).await.unwrap());
    tx.commit().await.unwrap();

    assert_eq!(graph.count_cached(ids[1], &follows(Incoming)).await.unwrap(), 1);
    assert_eq!(graph.count_naive(ids[1], &follows(Incoming)).await.unwrap(), 1);
}

// ============================================================================
// 3. Property updates move weight between shapes
// ============================================================================

#[tokio::test]
async fn test_property_update_moves_degree() {
    let graph = Graph::open_memory().await.unwrap();
    let ids = nodes(&graph, 2).await;

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    let rel = tx
        .create_relationship(ids[0], ids[1], "FOLLOWS", properties([("strength", 1)]))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    tx.set_relationship_property(rel, "strength", Value::Int(5)).await.unwrap();
    tx.commit().await.unwrap();

    let cached = degrees(&graph, ids[0]).await;
    assert_eq!(cached.len(), 1);
    assert_eq!(cached.get(&strength(Outgoing, 5)), Some(1));

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    tx.remove_relationship_property(rel, "strength").await.unwrap();
    tx.commit().await.unwrap();

    let absent = follows(Outgoing).with("strength", PropertyPredicate::Absent);
    assert_eq!(graph.count_cached(ids[0], &absent).await.unwrap(), 1);
    assert_eq!(graph.count_naive(ids[0], &absent).await.unwrap(), 1);
    assert_eq!(degrees(&graph, ids[1]).await.get(&follows(Incoming)), Some(1));
}

// ============================================================================
// 4. Self-relationships count once per direction
// ============================================================================

#[tokio::test]
async fn test_self_relationship() {
    let graph = Graph::open_memory().await.unwrap();
    let ids = nodes(&graph, 1).await;

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    tx.create_relationship(ids[0], ids[0], "FOLLOWS", PropertyMap::new()).await.unwrap();
    tx.commit().await.unwrap();

    for direction in [Outgoing, Incoming] {
        assert_eq!(graph.count_cached(ids[0], &follows(direction)).await.unwrap(), 1);
        assert_eq!(graph.count_naive(ids[0], &follows(direction)).await.unwrap(), 1);
    }
}

// ============================================================================
// 5. Rollback writes nothing
// ============================================================================

#[tokio::test]
async fn test_rollback_skips_degree_writes() {
    let graph = Graph::open_memory().await.unwrap();
    let ids = nodes(&graph, 2).await;

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    tx.create_relationship(ids[0], ids[1], "FOLLOWS", PropertyMap::new()).await.unwrap();
    tx.rollback().await.unwrap();

    assert!(degree_keys(&graph, ids[0]).await.is_empty());
    assert!(degree_keys(&graph, ids[1]).await.is_empty());
}

// ============================================================================
// 6. Recovery and initialization
// ============================================================================

#[tokio::test]
async fn test_out_of_sync_cache_is_rebuilt_on_commit() {
    let graph = Graph::open_memory().await.unwrap();
    let ids = nodes(&graph, 3).await;

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    let rel = tx.create_relationship(ids[0], ids[1], "FOLLOWS", PropertyMap::new()).await.unwrap();
    tx.create_relationship(ids[0], ids[2], "FOLLOWS", PropertyMap::new()).await.unwrap();
    tx.commit().await.unwrap();

    // wipe node 0's degrees behind the module's back
    let stale = degree_keys(&graph, ids[0]).await;
    let backend = graph.backend();
    let mut raw = backend.begin_tx(TxMode::ReadWrite).await.unwrap();
    for key in stale {
        backend.remove_node_property(&mut raw, ids[0], &key).await.unwrap();
    }
    backend.commit_tx(raw).await.unwrap();

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    tx.delete_relationship(rel).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(graph.count_cached(ids[0], &follows(Outgoing)).await.unwrap(), 1);
    assert!(degree_keys(&graph, ids[1]).await.is_empty());
    assert_eq!(graph.count_cached(ids[2], &follows(Incoming)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_corrupt_degree_surfaces_from_cached_counter() {
    let graph = Graph::open_memory().await.unwrap();
    let ids = nodes(&graph, 1).await;

    let backend = graph.backend();
    let mut raw = backend.begin_tx(TxMode::ReadWrite).await.unwrap();
    backend
        .set_node_property(&mut raw, ids[0], "_GA_FRC_garbage", Value::Int(1))
        .await
        .unwrap();
    backend.commit_tx(raw).await.unwrap();

    let err = graph.count_cached(ids[0], &follows(Outgoing)).await.unwrap_err();
    assert!(matches!(err, Error::CorruptDegree { .. }));
    assert!(err.needs_initialization());

    graph.initialize().await.unwrap();
    assert!(degree_keys(&graph, ids[0]).await.is_empty());
    assert_eq!(graph.count_cached(ids[0], &follows(Outgoing)).await.unwrap(), 0);
}

#[tokio::test]
async fn test_initialize_existing_graph() {
    let backend = MemoryBackend::new();
    let mut raw = backend.begin_tx(TxMode::ReadWrite).await.unwrap();
    let a = backend.create_node(&mut raw, &["Person"], PropertyMap::new()).await.unwrap();
    let b = backend.create_node(&mut raw, &["Person"], PropertyMap::new()).await.unwrap();
    backend.create_relationship(&mut raw, a, b, "FOLLOWS", properties([("strength", 1)])).await.unwrap();
    backend.create_relationship(&mut raw, a, b, "LIKES", PropertyMap::new()).await.unwrap();
    backend.create_relationship(&mut raw, a, a, "FOLLOWS", PropertyMap::new()).await.unwrap();
    backend.commit_tx(raw).await.unwrap();

    let graph = Graph::with_backend(backend);
    assert!(degree_keys(&graph, a).await.is_empty());

    assert_eq!(graph.initialize().await.unwrap(), 2);

    let cached = degrees(&graph, a).await;
    assert_eq!(cached.len(), 4);
    assert_eq!(cached.get(&strength(Outgoing, 1)), Some(1));
    assert_eq!(cached.get(&follows(Outgoing)), Some(1));
    assert_eq!(cached.get(&follows(Incoming)), Some(1));
    assert_eq!(cached.get(&RelationshipShape::wildcard("LIKES", Outgoing)), Some(1));
    assert_eq!(degrees(&graph, b).await.len(), 2);

    // idempotent
    graph.initialize().await.unwrap();
    assert_eq!(degrees(&graph, a).await, cached);
}

#[tokio::test]
async fn test_clear_removes_only_module_properties() {
    let graph = Graph::open_memory().await.unwrap();
    let ids = nodes(&graph, 2).await;

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    tx.set_node_property(ids[0], "name", Value::from("Ada")).await.unwrap();
    tx.create_relationship(ids[0], ids[1], "FOLLOWS", PropertyMap::new()).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(graph.module().clear(graph.backend()).await.unwrap(), 2);

    let tx = graph.begin(TxMode::ReadOnly).await.unwrap();
    let node = tx.get_node(ids[0]).await.unwrap().unwrap();
    assert_eq!(node.properties, properties([("name", "Ada")]));
}

// ============================================================================
// 7. Configuration: weighing, inclusion, persistence
// ============================================================================

#[tokio::test]
async fn test_weighted_degrees() {
    let config = RelationshipCountConfig::default().with_weighing(PropertyWeight::new("strength", 1));
    let graph = Graph::with_config(MemoryBackend::new(), config).unwrap();
    let ids = nodes(&graph, 3).await;

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    tx.create_relationship(ids[0], ids[1], "FRIEND_OF", properties([("strength", 3)])).await.unwrap();
    tx.create_relationship(ids[0], ids[2], "FRIEND_OF", PropertyMap::new()).await.unwrap();
    tx.commit().await.unwrap();

    let friends = RelationshipShape::wildcard("FRIEND_OF", Outgoing);
    assert_eq!(graph.count_cached(ids[0], &friends).await.unwrap(), 4);
    assert_eq!(graph.count_naive(ids[0], &friends).await.unwrap(), 4);
}

#[tokio::test]
async fn test_weight_overflow_fails_commit() {
    let config = RelationshipCountConfig::default().with_weighing(PropertyWeight::new("w", 1));
    let graph = Graph::with_config(MemoryBackend::new(), config).unwrap();
    let ids = nodes(&graph, 2).await;

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    for _ in 0..2 {
        tx.create_relationship(ids[0], ids[1], "R", properties([("w", i64::MAX)])).await.unwrap();
    }
    let err = tx.commit().await.unwrap_err();
    assert!(matches!(err, Error::WeightOverflow(_)));
    assert!(!err.needs_initialization());

    assert!(degree_keys(&graph, ids[0]).await.is_empty());
    assert!(degree_keys(&graph, ids[1]).await.is_empty());
}

#[tokio::test]
async fn test_inclusion_policies() {
    let config = RelationshipCountConfig::default()
        .with_relationship_inclusion(|rel: &Relationship| rel.rel_type != "AUDIT")
        .with_property_inclusion(|key: &str, _: &Relationship| key != "timestamp");
    let graph = Graph::with_config(MemoryBackend::new(), config).unwrap();
    let ids = nodes(&graph, 2).await;

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    tx.create_relationship(ids[0], ids[1], "AUDIT", PropertyMap::new()).await.unwrap();
    tx.create_relationship(
        ids[0],
        ids[1],
        "FOLLOWS",
        properties([("strength", Value::Int(1)), ("timestamp", Value::Int(99))]),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let cached = degrees(&graph, ids[0]).await;
    assert_eq!(cached.len(), 1);
    assert_eq!(cached.get(&strength(Outgoing, 1)), Some(1));

    let audit = RelationshipShape::wildcard("AUDIT", Outgoing);
    assert_eq!(graph.count_cached(ids[0], &audit).await.unwrap(), 0);
    assert_eq!(graph.count_naive(ids[0], &audit).await.unwrap(), 0);

    let stamped = follows(Outgoing).with("timestamp", PropertyPredicate::equal_to(99));
    assert_eq!(graph.count_naive(ids[0], &stamped).await.unwrap(), 0);
    assert_eq!(graph.count_cached(ids[0], &stamped).await.unwrap(), 0);
}

#[tokio::test]
async fn test_single_property_persistence() {
    let config = RelationshipCountConfig::default().with_caching(SingleNodePropertyStrategy);
    let graph = Graph::with_config(MemoryBackend::new(), config).unwrap();
    let ids = nodes(&graph, 3).await;

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    let rel = tx
        .create_relationship(ids[0], ids[1], "FOLLOWS", properties([("strength", 1)]))
        .await
        .unwrap();
    tx.create_relationship(ids[0], ids[2], "FOLLOWS", properties([("strength", 2)])).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(degree_keys(&graph, ids[0]).await, vec!["_GA_FRC_DEGREES".to_string()]);
    assert_eq!(graph.count_cached(ids[0], &strength(Outgoing, 2)).await.unwrap(), 1);

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    tx.delete_relationship(rel).await.unwrap();
    tx.commit().await.unwrap();
    assert!(degree_keys(&graph, ids[1]).await.is_empty());
    assert_eq!(graph.count_cached(ids[0], &follows(Outgoing)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let config = RelationshipCountConfig::default().with_threshold(0);
    assert!(matches!(
        Graph::with_config(MemoryBackend::new(), config),
        Err(Error::Config(_))
    ));
}

#[tokio::test]
async fn test_missing_node_is_not_found() {
    let graph = Graph::open_memory().await.unwrap();
    let err = graph.count_cached(NodeId(404), &follows(Outgoing)).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(graph.count_naive(NodeId(404), &follows(Outgoing)).await.unwrap(), 0);
}

// ============================================================================
// 8. Non-finite float property values
// ============================================================================

#[tokio::test]
async fn test_non_finite_float_values_are_cached() {
    let graph = Graph::open_memory().await.unwrap();
    let ids = nodes(&graph, 3).await;
    let w = |v: f64| follows(Outgoing).with("w", PropertyPredicate::equal_to(v));

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    tx.create_relationship(ids[0], ids[1], "FOLLOWS", properties([("w", f64::INFINITY)])).await.unwrap();
    let nan = tx.create_relationship(ids[0], ids[2], "FOLLOWS", properties([("w", f64::NAN)])).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(degrees(&graph, ids[0]).await.len(), 2);
    assert_eq!(graph.count_cached(ids[0], &follows(Outgoing)).await.unwrap(), 2);
    assert_eq!(graph.count_naive(ids[0], &follows(Outgoing)).await.unwrap(), 2);
    assert_eq!(graph.count_cached(ids[0], &w(f64::INFINITY)).await.unwrap(), 1);
    assert_eq!(graph.count(ids[0], &w(f64::INFINITY)).await.unwrap(), 1);
    assert_eq!(graph.count_naive(ids[0], &w(f64::INFINITY)).await.unwrap(), 1);
    assert_eq!(graph.count_cached(ids[0], &w(f64::NAN)).await.unwrap(), 1);
    assert_eq!(graph.count_cached(ids[1], &follows(Incoming)).await.unwrap(), 1);

    let mut tx = graph.begin(TxMode::ReadWrite).await.unwrap();
    tx.create_relationship(ids[0], ids[1], "FOLLOWS", properties([("w", f64::NEG_INFINITY)])).await.unwrap();
    tx.create_relationship(ids[0], ids[1], "FOLLOWS", properties([("w", f64::INFINITY)])).await.unwrap();
    tx.delete_relationship(nan).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(graph.count_cached(ids[0], &follows(Outgoing)).await.unwrap(), 3);
    assert_eq!(graph.count_naive(ids[0], &follows(Outgoing)).await.unwrap(), 3);
    assert_eq!(graph.count_cached(ids[0], &w(f64::INFINITY)).await.unwrap(), 2);
    assert_eq!(graph.count_cached(ids[0], &w(f64::NEG_INFINITY)).await.unwrap(), 1);
    assert_eq!(graph.count_cached(ids[0], &w(f64::NAN)).await.unwrap(), 0);
}
