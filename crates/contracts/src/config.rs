//! ColonyBlueprint - Config Loader output
//!
//! Describes one colony deployment: topology, tracker thresholds, tube event
//! detector tuning, read-sequence tuning, merge policy, known animals and
//! output routing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::{ColonyLayout, ContractError, TagId, Topology};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete colony configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColonyBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Topology and streaming tracker settings
    pub colony: ColonyConfig,

    /// Batch tube event detector settings
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Read-sequence occupancy settings
    #[serde(default)]
    pub sequence: SequenceConfig,

    /// Occupancy merge policy
    #[serde(default)]
    pub merge: MergeConfig,

    /// Known animals (display names and metadata)
    #[serde(default)]
    pub animals: Vec<AnimalProfile>,

    /// Output routing
    #[serde(default)]
    pub output: OutputConfig,
}

impl ColonyBlueprint {
    /// Blueprint with default settings for an `n_tubes` colony
    pub fn with_layout(layout: ColonyLayout) -> Self {
        Self {
            version: ConfigVersion::V1,
            colony: ColonyConfig::new(layout),
            detector: DetectorConfig::default(),
            sequence: SequenceConfig::default(),
            merge: MergeConfig::default(),
            animals: Vec::new(),
            output: OutputConfig::default(),
        }
    }

    /// Display name for a tag, falling back to the tag itself
    pub fn display_name(&self, tag: &TagId) -> String {
        self.animals
            .iter()
            .find(|a| &a.tag == tag)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| tag.to_string())
    }
}

/// Topology and streaming tracker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColonyConfig {
    pub n_tubes: usize,

    #[serde(default)]
    pub topology: Topology,

    /// Gap (ms) separating two visits to one tube from one long presence
    #[serde(default = "default_merge_threshold")]
    pub rfid_merge_threshold_ms: f64,

    /// Raise the merge threshold from observed transit times
    #[serde(default = "default_true")]
    pub autotune_merge_threshold: bool,

    /// Transits observed before autotuning takes effect
    #[serde(default = "default_autotune_min_samples")]
    pub autotune_min_samples: usize,

    /// Window (ms) for two animals on one tube to count as a chase.
    /// Defaults to the merge threshold.
    #[serde(default)]
    pub multi_animal_event_threshold_ms: Option<f64>,
}

impl ColonyConfig {
    pub fn new(layout: ColonyLayout) -> Self {
        Self {
            n_tubes: layout.n_tubes,
            topology: layout.topology,
            rfid_merge_threshold_ms: default_merge_threshold(),
            autotune_merge_threshold: true,
            autotune_min_samples: default_autotune_min_samples(),
            multi_animal_event_threshold_ms: None,
        }
    }

    pub fn layout(&self) -> ColonyLayout {
        ColonyLayout {
            n_tubes: self.n_tubes,
            topology: self.topology,
        }
    }

    pub fn multi_animal_threshold_ms(&self) -> f64 {
        self.multi_animal_event_threshold_ms
            .unwrap_or(self.rfid_merge_threshold_ms)
    }
}

fn default_merge_threshold() -> f64 {
    800.0
}

fn default_autotune_min_samples() -> usize {
    5
}

fn default_true() -> bool {
    true
}

/// Tube event detector settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Expansion (ms) applied to both intervals before the overlap test
    #[serde(default)]
    pub margin: f64,

    /// Beam / RFID intervals shorter than this (ms) are dropped
    #[serde(default)]
    pub min_duration: f64,

    /// Run the tail correction pass on unresolved events
    #[serde(default = "default_true")]
    pub ignore_tails: bool,

    /// Demote repeated same-direction events to unknown
    #[serde(default = "default_true")]
    pub remove_conflicts: bool,

    /// Events shorter than this (ms) compare rising edges, longer compare falling
    #[serde(default = "default_edge_split")]
    pub edge_split_duration: f64,

    /// Max gap (ms) between reads clustered into one presence when a tube
    /// reports no tag-in-range edges
    #[serde(default = "default_read_cluster_gap")]
    pub read_cluster_gap: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            margin: 0.0,
            min_duration: 0.0,
            ignore_tails: true,
            remove_conflicts: true,
            edge_split_duration: default_edge_split(),
            read_cluster_gap: default_read_cluster_gap(),
        }
    }
}

fn default_edge_split() -> f64 {
    1500.0
}

fn default_read_cluster_gap() -> f64 {
    500.0
}

/// Read-sequence occupancy settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Reads of one animal on one tube closer than this (ms) collapse into
    /// one. Unset: the shortest gap between reads on different tubes.
    #[serde(default)]
    pub merge_threshold_ms: Option<f64>,

    /// Animals with fewer valid reads get no read-sequence occupancy
    #[serde(default = "default_sequence_min_reads")]
    pub min_reads: usize,

    /// Max gap (ms) between consecutive reads of one multi-animal event.
    /// Unset: the colony's multi-animal threshold.
    #[serde(default)]
    pub event_gap_ms: Option<f64>,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            merge_threshold_ms: None,
            min_reads: default_sequence_min_reads(),
            event_gap_ms: None,
        }
    }
}

fn default_sequence_min_reads() -> usize {
    10
}

/// Merge policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Cull overlapping duplicates, keeping the most confident record
    #[serde(default = "default_true")]
    pub cull: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self { cull: true }
    }
}

/// Output routing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub occupancy: Option<PathBuf>,

    #[serde(default)]
    pub chases: Option<PathBuf>,

    #[serde(default)]
    pub tube_events: Option<PathBuf>,

    /// Animals with fewer valid reads are left out of the outputs
    #[serde(default)]
    pub min_reads: usize,
}

/// Metadata keys owned by the tracker itself
pub const RESERVED_META_KEYS: [&str; 3] = ["name", "rfid", "tag"];

/// A known animal: tag, display name and free-form metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalProfile {
    pub tag: TagId,

    pub name: String,

    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl AnimalProfile {
    /// Profile whose display name is the tag
    pub fn anonymous(tag: TagId) -> Self {
        Self {
            name: tag.to_string(),
            tag,
            meta: BTreeMap::new(),
        }
    }

    /// Validated constructor; rejects reserved metadata keys
    pub fn new(
        tag: impl Into<TagId>,
        name: impl Into<String>,
        meta: BTreeMap<String, String>,
    ) -> Result<Self, ContractError> {
        let profile = Self {
            tag: tag.into(),
            name: name.into(),
            meta,
        };
        profile.check_meta()?;
        Ok(profile)
    }

    /// Fails on the first reserved metadata key
    pub fn check_meta(&self) -> Result<(), ContractError> {
        match self
            .meta
            .keys()
            .find(|k| RESERVED_META_KEYS.contains(&k.to_ascii_lowercase().as_str()))
        {
            Some(key) => Err(ContractError::ReservedMetaKey {
                tag: self.tag.to_string(),
                key: key.clone(),
            }),
            None => Ok(()),
        }
    }
}
