//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//!
//! Several detection values changed between model generations (ensemble
//! weights, acceptance threshold, feature count). They are kept here as
//! named defaults, overridable through `EngineConfig`, and logged at start-up.

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "FlowGuard";

/// Directory name under the platform data dir
pub const DATA_DIR_NAME: &str = "flowguard";

/// Label every scorer uses for normal traffic
pub const BENIGN_LABEL: &str = "BenignTraffic";

// ============================================
// Flow assembly
// ============================================

/// Emit a feature snapshot every N packets of a flow
pub const DEFAULT_SNAPSHOT_INTERVAL: u64 = 10;

/// Flows idle longer than this (packet clock, seconds) are evicted
pub const DEFAULT_FLOW_IDLE_TIMEOUT_SECS: f64 = 120.0;

/// Hard cap on tracked flows
pub const DEFAULT_MAX_FLOWS: usize = 100_000;

/// Run the idle sweep every N ingested packets
pub const DEFAULT_EVICTION_CHECK_EVERY: u64 = 1_000;

// ============================================
// Ensemble
// ============================================

/// Scorer id of the tree-ensemble classifier
pub const RANDOM_FOREST_ID: &str = "random_forest";

/// Scorer id of the feed-forward network
pub const DEEP_LEARNING_ID: &str = "deep_learning";

/// Scorer id of the model-free rule scorer
pub const RULES_ID: &str = "rules";

/// Most recent weights (older generations used 0.4 / 0.6)
pub const DEFAULT_RF_WEIGHT: f64 = 0.6;
pub const DEFAULT_DL_WEIGHT: f64 = 0.4;

/// Acceptance threshold (older generations used 0.55)
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 0.4;

/// Standardized features are clipped to +/- this many deviations
pub const DEFAULT_CLIP_Z: f64 = 5.0;

/// Confidence multiplier when every scorer agrees
pub const UNANIMOUS_BOOST: f64 = 1.15;

// ============================================
// Adaptive baseline
// ============================================

pub const DEFAULT_LEARNING_PERIOD_SECS: f64 = 3600.0;
pub const DEFAULT_BASELINE_ALERT_THRESHOLD: f64 = 0.85;
pub const TRUSTED_SOURCE_ADJUSTMENT: f64 = -0.15;
pub const COMMON_FLOW_ADJUSTMENT: f64 = -0.20;
pub const COMMON_PORT_ADJUSTMENT: f64 = -0.10;
pub const COMMON_FLOW_MIN_COUNT: u64 = 10;
pub const COMMON_PORT_MIN_COUNT: u64 = 50;
pub const BASELINE_SAVE_EVERY: u64 = 100;

// ============================================
// Alerts / response
// ============================================

pub const DEFAULT_ALERT_RETENTION_DAYS: i64 = 30;
pub const DEFAULT_TEMP_BLOCK_SECS: i64 = 3600;
pub const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 60;

// ============================================
// Helper functions to read from env with fallback
// ============================================

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Get data directory from environment or platform default
pub fn get_data_dir() -> std::path::PathBuf {
    std::env::var("FLOWGUARD_DATA_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_local_dir()
                .unwrap_or_else(|| std::path::PathBuf::from("."))
                .join(DATA_DIR_NAME)
        })
}

/// Get acceptance threshold from environment or use default
pub fn get_acceptance_threshold() -> f64 {
    env_parse("FLOWGUARD_ACCEPT_THRESHOLD").unwrap_or(DEFAULT_ACCEPTANCE_THRESHOLD)
}

/// Get random-forest weight from environment or use default
pub fn get_rf_weight() -> f64 {
    env_parse("FLOWGUARD_WEIGHT_RF").unwrap_or(DEFAULT_RF_WEIGHT)
}

/// Get deep-learning weight from environment or use default
pub fn get_dl_weight() -> f64 {
    env_parse("FLOWGUARD_WEIGHT_DL").unwrap_or(DEFAULT_DL_WEIGHT)
}

/// Get learning window from environment or use default
pub fn get_learning_period() -> f64 {
    env_parse("FLOWGUARD_LEARNING_PERIOD").unwrap_or(DEFAULT_LEARNING_PERIOD_SECS)
}

/// Get snapshot interval from environment or use default
pub fn get_snapshot_interval() -> u64 {
    env_parse::<u64>("FLOWGUARD_SNAPSHOT_INTERVAL")
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_SNAPSHOT_INTERVAL)
}

/// Get clip bound from environment or use default
pub fn get_clip_z() -> f64 {
    env_parse("FLOWGUARD_CLIP_Z").unwrap_or(DEFAULT_CLIP_Z)
}

/// Check if clipping is enabled
pub fn is_clip_enabled() -> bool {
    std::env::var("FLOWGUARD_CLIP_ENABLED")
        .map(|s| s.to_lowercase() != "false" && s != "0")
        .unwrap_or(true)
}

/// Feature schema name from environment ("ciciot37" / "ciciot46")
pub fn get_feature_schema() -> Option<String> {
    std::env::var("FLOWGUARD_FEATURE_SCHEMA").ok()
}

/// Directory holding ONNX scorer artifacts, if any
pub fn get_model_dir() -> Option<std::path::PathBuf> {
    std::env::var("FLOWGUARD_MODEL_DIR").ok().map(std::path::PathBuf::from)
}

/// Maintenance pass interval in seconds
pub fn get_maintenance_interval() -> u64 {
    env_parse::<u64>("FLOWGUARD_MAINTENANCE_INTERVAL")
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAINTENANCE_INTERVAL_SECS)
}

/// Enforce blocks through iptables instead of the in-memory dry run
pub fn use_iptables() -> bool {
    std::env::var("FLOWGUARD_FIREWALL")
        .map(|s| s.eq_ignore_ascii_case("iptables"))
        .unwrap_or(false)
}

/// JSONL packet capture to replay instead of synthetic traffic
pub fn get_replay_file() -> Option<std::path::PathBuf> {
    std::env::var("FLOWGUARD_REPLAY").ok().map(std::path::PathBuf::from)
}
