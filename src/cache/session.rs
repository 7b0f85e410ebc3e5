//! Degree-cache session: one start/end bracket per committing transaction.

use std::sync::Arc;

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use tracing::{debug, warn};

use super::{DegreeCachingNode, DegreeWrites};
use crate::config::RelationshipCountConfig;
use crate::description::RelationshipShape;
use crate::model::{Node, NodeId, Relationship, ResolvedDirection};
use crate::{Error, Result};

/// Caches degrees for the nodes touched between `start_caching` and
/// `end_caching`.
///
/// ```text
/// start_caching → handle_created / handle_deleted … → end_caching → writes
/// ```
///
/// Nodes are loaded from their persisted properties on first touch. Dropping
/// the session or calling [`DegreeCache::abandon`] discards everything.
#[derive(Debug)]
pub struct DegreeCache {
    config: Arc<RelationshipCountConfig>,
    nodes: Option<HashMap<NodeId, DegreeCachingNode>>,
}

impl DegreeCache {
    pub fn new(config: Arc<RelationshipCountConfig>) -> Self {
        Self { config, nodes: None }
    }

    pub fn is_caching(&self) -> bool {
        self.nodes.is_some()
    }

    pub fn start_caching(&mut self) -> Result<()> {
        if self.nodes.is_some() {
            return Err(Error::SessionMisuse("start_caching called twice without end_caching".into()));
        }
        debug!("relcount.session.start");
        self.nodes = Some(HashMap::new());
        Ok(())
    }

    /// Account for a created relationship from `pov`'s side.
    ///
    /// `default` is the direction used when `pov` is both start and end.
    pub fn handle_created(&mut self, rel: &Relationship, pov: &Node, default: ResolvedDirection) -> Result<()> {
        let Some((shape, weight)) = self.describe(rel, pov, default)? else {
            return Ok(());
        };
        self.node(pov)?.increment(shape, weight)
    }

    /// Account for a deleted relationship from `pov`'s side.
    pub fn handle_deleted(&mut self, rel: &Relationship, pov: &Node, default: ResolvedDirection) -> Result<()> {
        let Some((shape, weight)) = self.describe(rel, pov, default)? else {
            return Ok(());
        };
        self.node(pov)?.decrement(&shape, weight)
    }

    /// Close the bracket and return the property writes for every touched
    /// node, ordered by node id. The bracket is closed even on error.
    pub fn end_caching(&mut self) -> Result<Vec<DegreeWrites>> {
        let nodes = self
            .nodes
            .take()
            .ok_or_else(|| Error::SessionMisuse("end_caching called without start_caching".into()))?;

        let mut nodes: Vec<DegreeCachingNode> = nodes.into_values().collect();
        nodes.sort_by_key(DegreeCachingNode::id);

        let mut writes = Vec::with_capacity(nodes.len());
        for node in &mut nodes {
            let flushed = node.flush()?;
            if !flushed.is_empty() {
                writes.push(flushed);
            }
        }
        debug!(nodes = nodes.len(), writes = writes.len(), "relcount.session.end");
        Ok(writes)
    }

    /// Close the bracket without producing writes.
    pub fn abandon(&mut self) {
        if let Some(nodes) = self.nodes.take() {
            debug!(nodes = nodes.len(), "relcount.session.abandon");
        }
    }

    /// The in-progress degrees of a node touched in this bracket.
    pub fn cached(&self, id: NodeId) -> Option<&DegreeCachingNode> {
        self.nodes.as_ref()?.get(&id)
    }

    fn describe(
        &self,
        rel: &Relationship,
        pov: &Node,
        default: ResolvedDirection,
    ) -> Result<Option<(RelationshipShape, i64)>> {
        if self.nodes.is_none() {
            return Err(Error::SessionMisuse(format!(
                "relationship {} handled outside a caching bracket", rel.id
            )));
        }

        let weight = self.config.weighing().weight(rel, pov.id);
        if weight <= 0 {
            if weight < 0 {
                warn!(rel = %rel.id, node = %pov.id, weight, "relcount.weight.negative");
            }
            return Ok(None);
        }

        let shape = self.config.describe(rel, pov.id, default)?;
        Ok(Some((shape, weight)))
    }

    fn node(&mut self, pov: &Node) -> Result<&mut DegreeCachingNode> {
        let nodes = self
            .nodes
            .as_mut()
            .ok_or_else(|| Error::SessionMisuse("no caching bracket open".into()))?;

        match nodes.entry(pov.id) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let node = DegreeCachingNode::load(pov.id, &pov.properties, Arc::clone(&self.config))?;
                Ok(e.insert(node))
            }
        }
    }
}
