//! Transaction management.
//!
//! Besides identity and mode, every transaction carries the ordered log of
//! relationship changes it made. The degree cache consumes this log once,
//! right before the transaction commits.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::{NodeId, Relationship};

/// Transaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// Opaque transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction trait that all backends must implement.
pub trait Transaction: Send + Sync {
    fn mode(&self) -> TxMode;
    fn id(&self) -> TxId;

    /// Relationship changes made so far, in the order they happened.
    fn data(&self) -> &TransactionData;
}

/// One relationship mutation. Relationships are captured by value so that
/// deleted ones can still be inspected.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipChange {
    Created(Relationship),
    Deleted(Relationship),
    /// Property change: the relationship as it was and as it is now.
    Updated { before: Relationship, after: Relationship },
}

/// Everything a transaction did that the degree cache cares about.
#[derive(Debug, Clone, Default)]
pub struct TransactionData {
    changes: Vec<RelationshipChange>,
    deleted_nodes: HashSet<NodeId>,
}

impl TransactionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, change: RelationshipChange) {
        self.changes.push(change);
    }

    pub fn record_node_deleted(&mut self, node: NodeId) {
        self.deleted_nodes.insert(node);
    }

    pub fn changes(&self) -> &[RelationshipChange] {
        &self.changes
    }

    pub fn has_been_deleted(&self, node: NodeId) -> bool {
        self.deleted_nodes.contains(&node)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Iterate created relationships in order.
    pub fn created(&self) -> impl Iterator<Item = &Relationship> {
        self.changes.iter().filter_map(|c| match c {
            RelationshipChange::Created(r) => Some(r),
            _ => None,
        })
    }

    /// Iterate deleted relationships in order.
    pub fn deleted(&self) -> impl Iterator<Item = &Relationship> {
        self.changes.iter().filter_map(|c| match c {
            RelationshipChange::Deleted(r) => Some(r),
            _ => None,
        })
    }
}
