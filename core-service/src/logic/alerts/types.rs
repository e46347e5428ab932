use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logic::model::Severity;

pub const ALERT_STORE_VERSION: u32 = 1;

fn legacy_version() -> u32 {
    ALERT_STORE_VERSION
}

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Alert {0} not found")]
    NotFound(u64),
    #[error("Invalid alert status '{0}' (expected new, investigating, resolved, false_positive)")]
    InvalidStatus(String),
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization Error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    New,
    Investigating,
    Resolved,
    FalsePositive,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::New => "new",
            AlertStatus::Investigating => "investigating",
            AlertStatus::Resolved => "resolved",
            AlertStatus::FalsePositive => "false_positive",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(AlertStatus::New),
            "investigating" => Ok(AlertStatus::Investigating),
            "resolved" => Ok(AlertStatus::Resolved),
            "false_positive" => Ok(AlertStatus::FalsePositive),
            other => Err(AlertError::InvalidStatus(other.to_string())),
        }
    }
}

/// An accepted detection handed to `AlertManager::add`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub threat: String,
    pub severity: Severity,
    pub src_ip: String,
    pub dst_ip: String,
    pub dst_port: Option<u16>,
    /// Free text, e.g. baseline reason and packet count
    pub context: String,
    pub confidence: f64,
    pub method: String,
}

/// Stored alert record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub threat: String,
    pub severity: Severity,
    pub src_ip: String,
    pub dst_ip: String,
    #[serde(default)]
    pub dst_port: Option<u16>,
    #[serde(default)]
    pub context: String,
    pub confidence: f64,
    #[serde(default)]
    pub method: String,
    pub acknowledged: bool,
    #[serde(default)]
    pub acknowledged_by: Option<String>,
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: AlertStatus,
}

impl Alert {
    pub fn from_detection(id: u64, timestamp: DateTime<Utc>, detection: Detection) -> Self {
        let confidence = if detection.confidence.is_finite() {
            detection.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self {
            id,
            timestamp,
            threat: detection.threat,
            severity: detection.severity,
            src_ip: detection.src_ip,
            dst_ip: detection.dst_ip,
            dst_port: detection.dst_port,
            context: detection.context,
            confidence,
            method: detection.method,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            notes: None,
            status: AlertStatus::New,
        }
    }
}

/// Aggregates taken from one consistent view of the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCounts {
    pub total: usize,
    pub unacknowledged: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_status: BTreeMap<AlertStatus, usize>,
}

/// Conjunction of optional predicates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertFilter {
    pub severity: Option<Severity>,
    pub threat: Option<String>,
    pub acknowledged: Option<bool>,
    pub status: Option<AlertStatus>,
    pub src_ip: Option<String>,
}

impl AlertFilter {
    pub fn matches(&self, alert: &Alert) -> bool {
        self.severity.map_or(true, |s| alert.severity == s)
            && self.threat.as_deref().map_or(true, |t| alert.threat == t)
            && self.acknowledged.map_or(true, |a| alert.acknowledged == a)
            && self.status.map_or(true, |s| alert.status == s)
            && self.src_ip.as_deref().map_or(true, |ip| alert.src_ip == ip)
    }
}

/// Persisted alert file: `{version, alerts, acknowledged_alerts, alert_counter, last_updated}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertStore {
    #[serde(default = "legacy_version")]
    pub version: u32,
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub acknowledged_alerts: BTreeSet<u64>,
    pub alert_counter: u64,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self {
            version: ALERT_STORE_VERSION,
            ..Self::default()
        }
    }
}
