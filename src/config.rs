//! Configuration: serde-loadable settings plus the strategy objects the
//! cache, compactor and counters consult.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::cache::{DegreeCachingStrategy, NodePropertiesStrategy};
use crate::compact::{ChangeFrequencies, CompactionStrategy, ThresholdCompaction};
use crate::description::RelationshipShape;
use crate::model::{NodeId, PropertyMap, Relationship, ResolvedDirection};
use crate::weigh::{OneForEach, WeighingStrategy};
use crate::{Error, Result};

// ============================================================================
// Settings
// ============================================================================

/// Plain settings, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipCountSettings {
    /// Module id, part of the reserved property prefix.
    pub id: String,
    /// Prefix shared by all internal node properties.
    pub prefix: String,
    /// Number of cached shapes per node above which compaction engages.
    pub threshold: usize,
}

impl Default for RelationshipCountSettings {
    fn default() -> Self {
        Self { id: "FRC".into(), prefix: "_GA_".into(), threshold: 20 }
    }
}

impl RelationshipCountSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.threshold == 0 {
            return Err(Error::Config("threshold must be at least 1".into()));
        }
        if self.id.is_empty() {
            return Err(Error::Config("module id must not be empty".into()));
        }
        if self.prefix.is_empty() {
            return Err(Error::Config("property prefix must not be empty".into()));
        }
        Ok(())
    }

    /// Prefix of every node property this module owns.
    pub fn key_prefix(&self) -> String {
        format!("{}{}_", self.prefix, self.id)
    }
}

// ============================================================================
// Inclusion policies
// ============================================================================

/// Decides which relationships the degree cache sees at all.
pub trait RelationshipInclusion: Send + Sync {
    fn include(&self, rel: &Relationship) -> bool;
}

/// Decides which relationship properties take part in shapes.
pub trait PropertyInclusion: Send + Sync {
    fn include(&self, key: &str, rel: &Relationship) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeAll;

impl RelationshipInclusion for IncludeAll {
    fn include(&self, _: &Relationship) -> bool {
        true
    }
}

impl PropertyInclusion for IncludeAll {
    fn include(&self, _: &str, _: &Relationship) -> bool {
        true
    }
}

impl<F> RelationshipInclusion for F
where
    F: Fn(&Relationship) -> bool + Send + Sync,
{
    fn include(&self, rel: &Relationship) -> bool {
        self(rel)
    }
}

impl<F> PropertyInclusion for F
where
    F: Fn(&str, &Relationship) -> bool + Send + Sync,
{
    fn include(&self, key: &str, rel: &Relationship) -> bool {
        self(key, rel)
    }
}

// ============================================================================
// Config
// ============================================================================

/// Settings plus strategies. Cheap to clone; builders return a new config.
#[derive(Clone)]
pub struct RelationshipCountConfig {
    settings: RelationshipCountSettings,
    weighing: Arc<dyn WeighingStrategy>,
    compaction: Arc<dyn CompactionStrategy>,
    caching: Arc<dyn DegreeCachingStrategy>,
    frequencies: Arc<RwLock<ChangeFrequencies>>,
    relationship_inclusion: Arc<dyn RelationshipInclusion>,
    property_inclusion: Arc<dyn PropertyInclusion>,
}

impl Default for RelationshipCountConfig {
    fn default() -> Self {
        Self::new(RelationshipCountSettings::default())
    }
}

impl RelationshipCountConfig {
    pub fn new(settings: RelationshipCountSettings) -> Self {
        Self {
            settings,
            weighing: Arc::new(OneForEach),
            compaction: Arc::new(ThresholdCompaction),
            caching: Arc::new(NodePropertiesStrategy),
            frequencies: Arc::new(RwLock::new(ChangeFrequencies::new())),
            relationship_inclusion: Arc::new(IncludeAll),
            property_inclusion: Arc::new(IncludeAll),
        }
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.settings.threshold = threshold;
        self
    }

    pub fn with_weighing(mut self, weighing: impl WeighingStrategy + 'static) -> Self {
        self.weighing = Arc::new(weighing);
        self
    }

    pub fn with_compaction(mut self, compaction: impl CompactionStrategy + 'static) -> Self {
        self.compaction = Arc::new(compaction);
        self
    }

    pub fn with_caching(mut self, caching: impl DegreeCachingStrategy + 'static) -> Self {
        self.caching = Arc::new(caching);
        self
    }

    /// Replace the change-frequency table with a fresh, unshared one.
    pub fn with_frequencies(mut self, frequencies: ChangeFrequencies) -> Self {
        self.frequencies = Arc::new(RwLock::new(frequencies));
        self
    }

    pub fn with_relationship_inclusion(mut self, policy: impl RelationshipInclusion + 'static) -> Self {
        self.relationship_inclusion = Arc::new(policy);
        self
    }

    pub fn with_property_inclusion(mut self, policy: impl PropertyInclusion + 'static) -> Self {
        self.property_inclusion = Arc::new(policy);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.settings.validate()
    }

    pub fn settings(&self) -> &RelationshipCountSettings {
        &self.settings
    }

    pub fn threshold(&self) -> usize {
        self.settings.threshold
    }

    pub fn key_prefix(&self) -> String {
        self.settings.key_prefix()
    }

    pub fn weighing(&self) -> &dyn WeighingStrategy {
        self.weighing.as_ref()
    }

    pub fn compaction(&self) -> &dyn CompactionStrategy {
        self.compaction.as_ref()
    }

    pub fn caching(&self) -> &dyn DegreeCachingStrategy {
        self.caching.as_ref()
    }

    /// Shared handle to the change-frequency table, for external refresh.
    pub fn frequencies(&self) -> Arc<RwLock<ChangeFrequencies>> {
        Arc::clone(&self.frequencies)
    }

    pub fn includes_relationship(&self, rel: &Relationship) -> bool {
        self.relationship_inclusion.include(rel)
    }

    /// Properties of `rel` visible to the cache.
    pub fn visible_properties(&self, rel: &Relationship) -> PropertyMap {
        rel.properties
            .iter()
            .filter(|(k, v)| !v.is_null() && self.property_inclusion.include(k, rel))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// The literal shape of `rel` from `pov`'s point of view.
    pub fn describe(
        &self,
        rel: &Relationship,
        pov: NodeId,
        default: ResolvedDirection,
    ) -> Result<RelationshipShape> {
        let direction = rel.resolve_direction(pov, default)?;
        Ok(RelationshipShape::literal(&rel.rel_type, direction, &self.visible_properties(rel)))
    }
}

impl fmt::Debug for RelationshipCountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipCountConfig")
            .field("settings", &self.settings)
            .field("compaction", &self.compaction)
            .field("caching", &self.caching)
            .field("frequencies", &self.frequencies.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::PropertyPredicate;
    use crate::model::RelId;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_settings() {
        let settings = RelationshipCountSettings::default();
        assert_eq!(settings.key_prefix(), "_GA_FRC_");
        assert_eq!(settings.threshold, 20);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_from_json() {
        let settings = RelationshipCountSettings::from_json(r#"{"threshold": 5}"#).unwrap();
        assert_eq!(
            settings,
            RelationshipCountSettings { id: "FRC".into(), prefix: "_GA_".into(), threshold: 5 }
        );

        assert!(matches!(
            RelationshipCountSettings::from_json(r#"{"threshold": 0}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(RelationshipCountSettings::from_json("{"), Err(Error::Json(_))));
    }

    #[test]
    fn test_builders_copy_on_write() {
        let base = RelationshipCountConfig::default();
        let tuned = base.clone().with_threshold(3);
        assert_eq!(base.threshold(), 20);
        assert_eq!(tuned.threshold(), 3);
        assert!(base.clone().with_threshold(0).validate().is_err());
    }

    #[test]
    fn test_describe_applies_property_inclusion() {
        let config = RelationshipCountConfig::default()
            .with_property_inclusion(|key: &str, _: &Relationship| key != "timestamp");
        let rel = Relationship::new(RelId(1), NodeId(1), NodeId(2), "FOLLOWS")
            .with_property("strength", 2)
            .with_property("timestamp", 1234);

        let shape = config.describe(&rel, NodeId(2), ResolvedDirection::Outgoing).unwrap();
        assert_eq!(
            shape,
            RelationshipShape::wildcard("FOLLOWS", ResolvedDirection::Incoming)
                .with("strength", PropertyPredicate::equal_to(2))
        );
        assert!(config.describe(&rel, NodeId(3), ResolvedDirection::Outgoing).is_err());
    }

    #[test]
    fn test_relationship_inclusion() {
        let config = RelationshipCountConfig::default()
            .with_relationship_inclusion(|rel: &Relationship| rel.rel_type != "IGNORED");
        let rel = Relationship::new(RelId(1), NodeId(1), NodeId(2), "IGNORED");
        assert!(!config.includes_relationship(&rel));
        assert!(RelationshipCountConfig::default().includes_relationship(&rel));
    }
}
