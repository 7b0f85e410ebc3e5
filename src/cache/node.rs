//! Degree-caching node: one node's in-memory degree map and its pending
//! persistence changes.

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::degree_map::add_weights;
use super::{DegreeMap, DegreeWrites};
use crate::compact::Generalization;
use crate::config::RelationshipCountConfig;
use crate::description::RelationshipShape;
use crate::model::{NodeId, PropertyMap};
use crate::{Error, Result};

type ShapeSet = SmallVec<[RelationshipShape; 4]>;

pub struct DegreeCachingNode {
    id: NodeId,
    config: Arc<RelationshipCountConfig>,
    degrees: DegreeMap,
    updated: ShapeSet,
    removed: ShapeSet,
}

impl DegreeCachingNode {
    /// A node with nothing cached yet.
    pub fn new(id: NodeId, config: Arc<RelationshipCountConfig>) -> Self {
        Self::with_degrees(id, config, DegreeMap::new())
    }

    pub fn with_degrees(id: NodeId, config: Arc<RelationshipCountConfig>, degrees: DegreeMap) -> Self {
        Self { id, config, degrees, updated: ShapeSet::new(), removed: ShapeSet::new() }
    }

    /// Load the persisted degrees found among a node's properties.
    pub fn load(id: NodeId, props: &PropertyMap, config: Arc<RelationshipCountConfig>) -> Result<Self> {
        let degrees = config.caching().read_degrees(props, &config.key_prefix())?;
        Ok(Self::with_degrees(id, config, degrees))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn degrees(&self) -> &DegreeMap {
        &self.degrees
    }

    /// Shapes pending a write, in the order they changed.
    pub fn updated(&self) -> &[RelationshipShape] {
        &self.updated
    }

    /// Shapes pending removal.
    pub fn removed(&self) -> &[RelationshipShape] {
        &self.removed
    }

    pub fn is_dirty(&self) -> bool {
        !self.updated.is_empty() || !self.removed.is_empty()
    }

    /// Account for `delta` more weight of relationships shaped like `shape`,
    /// then compact if the map grew past the threshold.
    ///
    /// Fails with [`Error::WeightOverflow`] when the entry's weight would
    /// leave `i64`; the increment is then not applied.
    pub fn increment(&mut self, shape: RelationshipShape, delta: i64) -> Result<()> {
        self.increment_with(shape, delta, false)
    }

    pub fn increment_with(&mut self, shape: RelationshipShape, delta: i64, prevent_compaction: bool) -> Result<()> {
        if delta <= 0 {
            warn!(node = %self.id, shape = %shape, delta, "relcount.increment.non_positive");
            return Ok(());
        }
        trace!(node = %self.id, shape = %shape, delta, "relcount.increment");

        if let Some(i) = self.degrees.find_covering(&shape) {
            let entry = &mut self.degrees.entries_mut()[i];
            entry.weight = add_weights(entry.weight, delta, &entry.shape)?;
            let changed = entry.shape.clone();
            self.mark_updated(changed);
            return Ok(());
        }

        let mut weight = delta;
        if shape.has_wildcards() {
            for entry in self.degrees.iter().filter(|e| shape.covers(&e.shape)) {
                weight = add_weights(weight, entry.weight, &shape)?;
            }
            let mut absorbed = Vec::new();
            self.degrees.entries_mut().retain(|e| {
                let covered = shape.covers(&e.shape);
                if covered {
                    absorbed.push(e.shape.clone());
                }
                !covered
            });
            for covered in absorbed {
                self.mark_removed(covered);
            }
        }

        self.degrees.add(shape.clone(), weight)?;
        self.mark_updated(shape);

        if !prevent_compaction {
            self.compact()?;
        }
        Ok(())
    }

    /// Account for `delta` less weight.
    ///
    /// Fails with [`Error::NeedsInitialization`] when no entry accounts for
    /// `shape` or when its weight would drop below zero. In the latter case
    /// the entry is removed first.
    pub fn decrement(&mut self, shape: &RelationshipShape, delta: i64) -> Result<()> {
        if delta <= 0 {
            if delta < 0 {
                warn!(node = %self.id, shape = %shape, delta, "relcount.decrement.negative");
            }
            return Ok(());
        }
        trace!(node = %self.id, shape = %shape, delta, "relcount.decrement");

        let Some(i) = self.degrees.find_covering(shape) else {
            warn!(node = %self.id, shape = %shape, "relcount.decrement.missing");
            return Err(Error::NeedsInitialization(format!(
                "no cached degree for {shape} on node {}", self.id
            )));
        };

        let entry = &mut self.degrees.entries_mut()[i];
        entry.weight -= delta;
        let remaining = entry.weight;
        let cached = entry.shape.clone();

        if remaining > 0 {
            self.mark_updated(cached);
            return Ok(());
        }

        self.degrees.entries_mut().remove(i);
        self.mark_removed(cached.clone());

        if remaining < 0 {
            warn!(node = %self.id, shape = %cached, remaining, "relcount.decrement.negative_weight");
            return Err(Error::NeedsInitialization(format!(
                "degree of {cached} on node {} fell to {remaining}", self.id
            )));
        }
        Ok(())
    }

    /// Run one compaction step. Returns whether the map changed.
    pub fn compact(&mut self) -> Result<bool> {
        let threshold = self.config.threshold();
        let proposal = {
            let frequencies = self.config.frequencies();
            let frequencies = frequencies.read();
            self.config.compaction().propose(&self.degrees, threshold, &frequencies)
        };

        match proposal {
            Some(generalization) => {
                self.apply(&generalization)?;
                Ok(true)
            }
            None => {
                if self.degrees.len() > threshold {
                    warn!(
                        node = %self.id,
                        shapes = self.degrees.len(),
                        threshold,
                        "relcount.compaction.exhausted"
                    );
                }
                Ok(false)
            }
        }
    }

    /// Wildcard the generalization's key across its group and merge.
    ///
    /// Per-group weight totals are unchanged. On [`Error::WeightOverflow`]
    /// the map is left as it was.
    pub fn apply(&mut self, generalization: &Generalization) -> Result<()> {
        let before = self.degrees.clone();

        let mut after = DegreeMap::new();
        for entry in before.iter() {
            let in_group = entry.shape.rel_type() == generalization.rel_type
                && entry.shape.direction() == generalization.direction;
            let shape = if in_group {
                entry.shape.generalize_key(&generalization.key)
            } else {
                entry.shape.clone()
            };
            after.add(shape, entry.weight)?;
        }
        after.normalize()?;

        for old in before.iter() {
            if !after.contains(&old.shape) {
                self.mark_removed(old.shape.clone());
            }
        }
        for new in after.iter() {
            if before.get(&new.shape) != Some(new.weight) {
                self.mark_updated(new.shape.clone());
            }
        }

        debug!(
            node = %self.id,
            generalization = %generalization,
            before = before.len(),
            after = after.len(),
            "relcount.compaction.applied"
        );
        self.degrees = after;
        Ok(())
    }

    /// Persistence writes for everything changed since the last flush.
    /// Pending changes are cleared only when encoding succeeds.
    pub fn flush(&mut self) -> Result<DegreeWrites> {
        let writes = self.config.caching().write_degrees(
            self.id,
            &self.degrees,
            &self.updated,
            &self.removed,
            &self.config.key_prefix(),
        )?;
        debug!(
            node = %self.id,
            set = writes.set.len(),
            remove = writes.remove.len(),
            "relcount.flush"
        );
        self.updated.clear();
        self.removed.clear();
        Ok(writes)
    }

    fn mark_updated(&mut self, shape: RelationshipShape) {
        self.removed.retain(|s| *s != shape);
        if !self.updated.contains(&shape) {
            self.updated.push(shape);
        }
    }

    fn mark_removed(&mut self, shape: RelationshipShape) {
        self.updated.retain(|s| *s != shape);
        if !self.removed.contains(&shape) {
            self.removed.push(shape);
        }
    }
}

impl std::fmt::Debug for DegreeCachingNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DegreeCachingNode")
            .field("id", &self.id)
            .field("degrees", &self.degrees)
            .field("updated", &self.updated.len())
            .field("removed", &self.removed.len())
            .finish()
    }
}
