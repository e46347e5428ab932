//! Alert notification collaborators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::APP_NAME;
use crate::logic::alerts::Alert;
use crate::logic::model::Severity;

/// Fire-and-forget notification backend
pub trait Notifier: Send + Sync {
    /// Send if `alert.severity >= threshold`; true when something was sent
    fn notify(&self, alert: &Alert, threshold: Severity) -> bool;
}

/// Payload handed to any delivery channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPayload {
    pub title: String,
    pub host: String,
    pub alert_id: u64,
    pub threat: String,
    pub severity: Severity,
    pub src_ip: String,
    pub dst_ip: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub context: String,
}

impl AlertPayload {
    pub fn from_alert(alert: &Alert, host: &str) -> Self {
        Self {
            title: format!(
                "{} Alert: {} - {} severity",
                APP_NAME,
                alert.threat,
                alert.severity.as_str().to_uppercase()
            ),
            host: host.to_string(),
            alert_id: alert.id,
            threat: alert.threat.clone(),
            severity: alert.severity,
            src_ip: alert.src_ip.clone(),
            dst_ip: alert.dst_ip.clone(),
            confidence: alert.confidence,
            timestamp: alert.timestamp,
            context: alert.context.clone(),
        }
    }
}

pub fn should_notify(severity: Severity, threshold: Severity) -> bool {
    severity >= threshold
}

/// Writes the payload to the log
pub struct LogNotifier {
    host: String,
}

impl LogNotifier {
    pub fn new() -> Self {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        Self { host }
    }

    pub fn with_host(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, alert: &Alert, threshold: Severity) -> bool {
        if !should_notify(alert.severity, threshold) {
            return false;
        }

        let payload = AlertPayload::from_alert(alert, &self.host);
        match serde_json::to_string(&payload) {
            Ok(json) => {
                log::warn!("NOTIFY {}: {}", payload.title, json);
                true
            }
            Err(e) => {
                log::error!("Failed to build notification for alert #{}: {}", alert.id, e);
                false
            }
        }
    }
}
