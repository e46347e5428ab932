//! Baseline Types - learned profile of normal traffic

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// VERSION
// ============================================================================

/// On-disk format version
pub const BASELINE_FORMAT_VERSION: u32 = 1;

fn legacy_version() -> u32 {
    BASELINE_FORMAT_VERSION
}

// ============================================================================
// PROFILE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineCounters {
    pub total_flows: u64,
    pub benign_flows: u64,
    pub threat_flows: u64,
}

/// Persisted baseline profile
///
/// JSON shape: `{version, id, start_time, learning_period, trusted_ips,
/// common_flows: {"src|dst|port": n}, port_usage: {port: n}, statistics}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineProfile {
    #[serde(default = "legacy_version")]
    pub version: u32,
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Learning window start, unix seconds
    pub start_time: f64,
    /// Learning window length, seconds
    pub learning_period: f64,
    pub trusted_ips: BTreeSet<String>,
    pub common_flows: BTreeMap<String, u64>,
    pub port_usage: BTreeMap<u16, u64>,
    pub statistics: BaselineCounters,
}

impl BaselineProfile {
    pub fn new(start_time: f64, learning_period: f64) -> Self {
        Self {
            version: BASELINE_FORMAT_VERSION,
            id: Uuid::new_v4(),
            start_time,
            learning_period,
            trusted_ips: BTreeSet::new(),
            common_flows: BTreeMap::new(),
            port_usage: BTreeMap::new(),
            statistics: BaselineCounters::default(),
        }
    }

    pub fn is_learning(&self, now: f64) -> bool {
        now - self.start_time < self.learning_period
    }

    /// Fraction of the learning window elapsed, in [0, 1]
    pub fn learning_progress(&self, now: f64) -> f64 {
        if self.learning_period <= 0.0 {
            return 1.0;
        }
        ((now - self.start_time) / self.learning_period).clamp(0.0, 1.0)
    }

    pub fn flow_count(&self, src: &IpAddr, dst: &IpAddr, dst_port: u16) -> u64 {
        self.common_flows.get(&flow_key(src, dst, dst_port)).copied().unwrap_or(0)
    }

    pub fn port_count(&self, dst_port: u16) -> u64 {
        self.port_usage.get(&dst_port).copied().unwrap_or(0)
    }

    pub fn is_trusted(&self, src: &IpAddr) -> bool {
        self.trusted_ips.contains(&src.to_string())
    }
}

/// `"src|dst|port"` key for the common-flow table
pub fn flow_key(src: &IpAddr, dst: &IpAddr, dst_port: u16) -> String {
    format!("{}|{}|{}", src, dst, dst_port)
}

// ============================================================================
// DECISIONS
// ============================================================================

/// Outcome of one `evaluate` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineDecision {
    pub should_alert: bool,
    pub original_confidence: f64,
    pub adjusted_confidence: f64,
    /// `learning_mode`, `no_baseline_match`, or matched reasons joined by ` + `
    pub reason: String,
    pub learning: bool,
    /// Present during the learning window
    pub learning_progress: Option<f64>,
    /// The flow was folded into the profile as benign
    pub learned: bool,
}

/// Read-only profile view for the query surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineStatistics {
    pub profile_id: Uuid,
    pub learning: bool,
    pub learning_progress: f64,
    pub total_flows: u64,
    pub benign_flows: u64,
    pub threat_flows: u64,
    pub trusted_ips: usize,
    pub common_flows: usize,
    pub ports_tracked: usize,
    /// (port, count), busiest first, at most 10
    pub top_ports: Vec<(u16, u64)>,
}
