//! Engine configuration
//!
//! Plain serde structs with defaults from `constants.rs`, plus an
//! environment overlay. File loading is left to the embedding process.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::model::Severity;
use crate::logic::features::FeatureSchema;

// ============================================================================
// SECTIONS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Snapshot every N packets of a flow
    pub snapshot_interval: u64,
    /// Idle flows older than this (packet clock) are evicted
    pub idle_timeout_secs: f64,
    pub max_flows: usize,
    /// Idle sweep cadence in ingested packets
    pub eviction_check_every: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: constants::DEFAULT_SNAPSHOT_INTERVAL,
            idle_timeout_secs: constants::DEFAULT_FLOW_IDLE_TIMEOUT_SECS,
            max_flows: constants::DEFAULT_MAX_FLOWS,
            eviction_check_every: constants::DEFAULT_EVICTION_CHECK_EVERY,
        }
    }
}

/// How scorer outputs are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FusionPolicy {
    #[default]
    WeightedThreshold,
    MajorityVote,
    HighestConfidence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub policy: FusionPolicy,
    /// Per-scorer weights; unknown scorers weigh 1.0
    pub weights: BTreeMap<String, f64>,
    /// Scorer ids taking part; empty means all registered scorers
    pub enabled: Vec<String>,
    pub acceptance_threshold: f64,
    pub clip_enabled: bool,
    pub clip_z: f64,
    pub unanimous_boost: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        let mut weights = BTreeMap::new();
        weights.insert(constants::RANDOM_FOREST_ID.to_string(), constants::DEFAULT_RF_WEIGHT);
        weights.insert(constants::DEEP_LEARNING_ID.to_string(), constants::DEFAULT_DL_WEIGHT);
        Self {
            policy: FusionPolicy::default(),
            weights,
            enabled: Vec::new(),
            acceptance_threshold: constants::DEFAULT_ACCEPTANCE_THRESHOLD,
            clip_enabled: true,
            clip_z: constants::DEFAULT_CLIP_Z,
            unanimous_boost: constants::UNANIMOUS_BOOST,
        }
    }
}

impl EnsembleConfig {
    pub fn weight_of(&self, scorer_id: &str) -> f64 {
        self.weights.get(scorer_id).copied().unwrap_or(1.0)
    }

    pub fn is_enabled(&self, scorer_id: &str) -> bool {
        self.enabled.is_empty() || self.enabled.iter().any(|id| id == scorer_id)
    }

    /// Weights as fusion applies them: rescaled to sum to 1 over `scorer_ids`,
    /// equal shares when every configured weight is zero
    pub fn normalized_weights<S: AsRef<str>>(&self, scorer_ids: &[S]) -> Vec<(String, f64)> {
        let raw: Vec<f64> = scorer_ids.iter().map(|id| self.weight_of(id.as_ref())).collect();
        let total: f64 = raw.iter().sum();
        let n = scorer_ids.len() as f64;
        scorer_ids
            .iter()
            .zip(raw)
            .map(|(id, w)| {
                let w = if total > 0.0 { w / total } else { 1.0 / n };
                (id.as_ref().to_string(), w)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub learning_period_secs: f64,
    pub alert_threshold: f64,
    pub trusted_adjustment: f64,
    pub common_flow_adjustment: f64,
    pub common_port_adjustment: f64,
    pub common_flow_min: u64,
    pub common_port_min: u64,
    /// Persist every N learned flows
    pub save_every: u64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            learning_period_secs: constants::DEFAULT_LEARNING_PERIOD_SECS,
            alert_threshold: constants::DEFAULT_BASELINE_ALERT_THRESHOLD,
            trusted_adjustment: constants::TRUSTED_SOURCE_ADJUSTMENT,
            common_flow_adjustment: constants::COMMON_FLOW_ADJUSTMENT,
            common_port_adjustment: constants::COMMON_PORT_ADJUSTMENT,
            common_flow_min: constants::COMMON_FLOW_MIN_COUNT,
            common_port_min: constants::COMMON_PORT_MIN_COUNT,
            save_every: constants::BASELINE_SAVE_EVERY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub retention_days: i64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self { retention_days: constants::DEFAULT_ALERT_RETENTION_DAYS }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    pub enabled: bool,
    pub auto_block_high: bool,
    pub auto_block_medium: bool,
    pub temp_block_secs: i64,
    pub whitelist: Vec<String>,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_block_high: true,
            auto_block_medium: false,
            temp_block_secs: constants::DEFAULT_TEMP_BLOCK_SECS,
            whitelist: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub severity_threshold: Severity,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { severity_threshold: Severity::High }
    }
}

// ============================================================================
// ENGINE CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub schema: FeatureSchema,
    pub flow: FlowConfig,
    pub ensemble: EnsembleConfig,
    pub baseline: BaselineConfig,
    pub alerts: AlertConfig,
    pub response: ResponseConfig,
    pub notify: NotifyConfig,
    /// Where baseline/alert/statistics files live; `None` keeps state in memory
    pub data_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema: FeatureSchema::default(),
            flow: FlowConfig::default(),
            ensemble: EnsembleConfig::default(),
            baseline: BaselineConfig::default(),
            alerts: AlertConfig::default(),
            response: ResponseConfig::default(),
            notify: NotifyConfig::default(),
            data_dir: None,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `FLOWGUARD_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.data_dir = Some(constants::get_data_dir());
        config.flow.snapshot_interval = constants::get_snapshot_interval();
        config.ensemble.acceptance_threshold = constants::get_acceptance_threshold();
        config.ensemble.clip_enabled = constants::is_clip_enabled();
        config.ensemble.clip_z = constants::get_clip_z();
        config.ensemble.weights.insert(constants::RANDOM_FOREST_ID.to_string(), constants::get_rf_weight());
        config.ensemble.weights.insert(constants::DEEP_LEARNING_ID.to_string(), constants::get_dl_weight());
        config.baseline.learning_period_secs = constants::get_learning_period();

        if let Some(name) = constants::get_feature_schema() {
            match name.parse::<FeatureSchema>() {
                Ok(schema) => config.schema = schema,
                Err(e) => log::warn!("{}; keeping {}", e, config.schema),
            }
        }

        config
    }

    pub fn baseline_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join("baseline.json"))
    }

    pub fn alerts_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join("alerts.json"))
    }

    pub fn statistics_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join("statistics.json"))
    }

    /// One-line summary of the values that differ between model generations
    pub fn describe_generation(&self) -> String {
        let weights: Vec<String> = self
            .ensemble
            .weights
            .iter()
            .map(|(id, w)| format!("{}={}", id, w))
            .collect();
        format!(
            "schema={} ({} features), weights[{}], threshold={}, policy={:?}",
            self.schema,
            self.schema.feature_count(),
            weights.join(", "),
            self.ensemble.acceptance_threshold,
            self.ensemble.policy,
        )
    }

    /// `describe_generation` plus the weights fusion actually uses for the
    /// loaded scorers, which differ from the configured ones unless those
    /// sum to 1 over the same set
    pub fn describe_generation_for<S: AsRef<str>>(&self, scorer_ids: &[S]) -> String {
        let effective: Vec<String> = self
            .ensemble
            .normalized_weights(scorer_ids)
            .iter()
            .map(|(id, w)| format!("{}={:.3}", id, w))
            .collect();
        format!("{}, effective[{}]", self.describe_generation(), effective.join(", "))
    }
}
