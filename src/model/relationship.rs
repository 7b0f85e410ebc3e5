//! Relationship (edge) in the property graph.

use serde::{Deserialize, Serialize};
use super::{NodeId, PropertyMap, Value};
use crate::{Error, Result};

/// Opaque relationship identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelId(pub u64);

impl std::fmt::Display for RelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// A direction resolved relative to one node. Never `Both`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResolvedDirection {
    Outgoing,
    Incoming,
}

impl ResolvedDirection {
    pub fn reverse(self) -> Self {
        match self {
            ResolvedDirection::Outgoing => ResolvedDirection::Incoming,
            ResolvedDirection::Incoming => ResolvedDirection::Outgoing,
        }
    }
}

impl From<ResolvedDirection> for Direction {
    fn from(dir: ResolvedDirection) -> Self {
        match dir {
            ResolvedDirection::Outgoing => Direction::Outgoing,
            ResolvedDirection::Incoming => Direction::Incoming,
        }
    }
}

impl TryFrom<Direction> for ResolvedDirection {
    type Error = Error;

    fn try_from(dir: Direction) -> Result<Self> {
        match dir {
            Direction::Outgoing => Ok(ResolvedDirection::Outgoing),
            Direction::Incoming => Ok(ResolvedDirection::Incoming),
            Direction::Both => Err(Error::SemanticError(
                "direction BOTH cannot be resolved to a single side".into(),
            )),
        }
    }
}

impl std::fmt::Display for ResolvedDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedDirection::Outgoing => write!(f, "OUTGOING"),
            ResolvedDirection::Incoming => write!(f, "INCOMING"),
        }
    }
}

/// A relationship (directed edge) in the property graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelId,
    pub src: NodeId,
    pub dst: NodeId,
    pub rel_type: String,
    pub properties: PropertyMap,
}

impl Relationship {
    pub fn new(id: RelId, src: NodeId, dst: NodeId, rel_type: impl Into<String>) -> Self {
        Self {
            id,
            src,
            dst,
            rel_type: rel_type.into(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The "other" end of the relationship from the given node.
    pub fn other_node(&self, from: NodeId) -> Option<NodeId> {
        if from == self.src { Some(self.dst) }
        else if from == self.dst { Some(self.src) }
        else { None }
    }

    /// Start and end are the same node.
    pub fn is_loop(&self) -> bool {
        self.src == self.dst
    }

    /// Direction of this relationship as seen from `pov`.
    ///
    /// A self-relationship is both outgoing and incoming, so `default`
    /// decides which side the caller is accounting for.
    pub fn resolve_direction(&self, pov: NodeId, default: ResolvedDirection) -> Result<ResolvedDirection> {
        if self.is_loop() && pov == self.src {
            Ok(default)
        } else if pov == self.src {
            Ok(ResolvedDirection::Outgoing)
        } else if pov == self.dst {
            Ok(ResolvedDirection::Incoming)
        } else {
            Err(Error::NotFound(format!(
                "node {pov} is not an endpoint of relationship {}", self.id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(src: u64, dst: u64) -> Relationship {
        Relationship::new(RelId(1), NodeId(src), NodeId(dst), "FOLLOWS")
    }

    #[test]
    fn test_resolve_direction() {
        let r = rel(1, 2);
        assert_eq!(r.resolve_direction(NodeId(1), ResolvedDirection::Incoming).unwrap(), ResolvedDirection::Outgoing);
        assert_eq!(r.resolve_direction(NodeId(2), ResolvedDirection::Outgoing).unwrap(), ResolvedDirection::Incoming);
        assert!(r.resolve_direction(NodeId(3), ResolvedDirection::Outgoing).is_err());
    }

    #[test]
    fn test_loop_uses_default() {
        let r = rel(5, 5);
        assert!(r.is_loop());
        assert_eq!(r.resolve_direction(NodeId(5), ResolvedDirection::Incoming).unwrap(), ResolvedDirection::Incoming);
        assert_eq!(r.resolve_direction(NodeId(5), ResolvedDirection::Outgoing).unwrap(), ResolvedDirection::Outgoing);
    }

    #[test]
    fn test_both_does_not_resolve() {
        assert!(ResolvedDirection::try_from(Direction::Both).is_err());
        assert_eq!(ResolvedDirection::try_from(Direction::Incoming).unwrap(), ResolvedDirection::Incoming);
        assert_eq!(Direction::from(ResolvedDirection::Outgoing), Direction::Outgoing);
    }
}
