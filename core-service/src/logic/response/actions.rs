//! Response Action Manager
//!
//! Maps alert severity to firewall actions and keeps the block table and
//! action history. Failures are recorded, never escalated.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use super::network::Firewall;
use super::types::{ActionResult, ActionStatus, BlockEntry, ResponseAction, ThreatResponse};
use crate::logic::alerts::Alert;
use crate::logic::config::ResponseConfig;
use crate::logic::model::Severity;

// ============================================================================
// CONSTANTS
// ============================================================================

const MAX_HISTORY: usize = 1000;
const REASON_MANUAL_UNBLOCK: &str = "manual_unblock";
const REASON_EXPIRED: &str = "block_expired";

// ============================================================================
// MANAGER
// ============================================================================

pub struct ResponseActionManager {
    config: ResponseConfig,
    firewall: Arc<dyn Firewall>,
    blocked: Mutex<HashMap<IpAddr, BlockEntry>>,
    whitelist: RwLock<HashSet<IpAddr>>,
    history: RwLock<Vec<ActionResult>>,
}

impl ResponseActionManager {
    pub fn new(config: ResponseConfig, firewall: Arc<dyn Firewall>) -> Self {
        let whitelist = config
            .whitelist
            .iter()
            .filter_map(|s| match s.parse::<IpAddr>() {
                Ok(ip) => Some(ip),
                Err(_) => {
                    log::warn!("Ignoring invalid whitelist entry '{}'", s);
                    None
                }
            })
            .collect();

        log::info!(
            "Response actions {} (firewall: {}, block high: {}, block medium: {})",
            if config.enabled { "enabled" } else { "disabled" },
            firewall.name(),
            config.auto_block_high,
            config.auto_block_medium
        );

        Self {
            config,
            firewall,
            blocked: Mutex::new(HashMap::new()),
            whitelist: RwLock::new(whitelist),
            history: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ResponseConfig {
        &self.config
    }

    /// Act on an accepted alert according to its severity
    pub fn handle_threat(&self, alert: &Alert) -> ThreatResponse {
        let Ok(ip) = alert.src_ip.parse::<IpAddr>() else {
            log::warn!("Cannot take action for alert #{}: no usable source address", alert.id);
            return ThreatResponse::default();
        };

        let reason = format!("{}_{}_severity", alert.threat, alert.severity);
        let mut actions = Vec::new();

        match alert.severity {
            Severity::High if self.config.auto_block_high => {
                actions.push(self.temporary_block(ip, &reason));
            }
            Severity::Medium if self.config.auto_block_medium => {
                actions.push(self.temporary_block(ip, &reason));
            }
            Severity::Low => {
                log::info!("Low severity threat from {}: monitoring only", ip);
                actions.push(self.record(ResponseAction::Monitor { ip }, ActionStatus::Success, &reason, "monitoring only"));
            }
            _ => {}
        }

        ThreatResponse {
            success: actions.iter().any(|a| a.success()),
            actions_taken: actions,
        }
    }

    /// Block an address; already-blocked counts as success
    pub fn block_ip(&self, ip: IpAddr, reason: &str, permanent: bool) -> bool {
        self.block_ip_at(ip, reason, permanent, Utc::now().timestamp())
    }

    pub fn block_ip_at(&self, ip: IpAddr, reason: &str, permanent: bool, now: i64) -> bool {
        let action = ResponseAction::BlockIp { ip, permanent };

        if !self.config.enabled {
            log::info!("Response actions disabled. Would have blocked {}", ip);
            return false;
        }
        if self.is_whitelisted(&ip) {
            log::info!("Refusing to block whitelisted address {}", ip);
            self.record(action, ActionStatus::Failed, reason, "whitelisted");
            return false;
        }

        let mut blocked = self.blocked.lock();
        if blocked.contains_key(&ip) {
            log::debug!("{} already blocked", ip);
            return true;
        }

        match self.firewall.block(ip, reason, permanent) {
            Ok(()) => {
                blocked.insert(
                    ip,
                    BlockEntry {
                        ip,
                        reason: reason.to_string(),
                        permanent,
                        blocked_at: now,
                    },
                );
                drop(blocked);
                log::warn!("Blocked {} ({})", ip, reason);
                self.record_at(action, ActionStatus::Success, reason, "blocked", now);
                true
            }
            Err(e) => {
                drop(blocked);
                log::error!("Failed to block {}: {}", ip, e);
                self.record_at(action, ActionStatus::Failed, reason, &e.to_string(), now);
                false
            }
        }
    }

    pub fn unblock_ip(&self, ip: IpAddr) -> bool {
        self.unblock_with_reason(ip, REASON_MANUAL_UNBLOCK)
    }

    fn unblock_with_reason(&self, ip: IpAddr, reason: &str) -> bool {
        if !self.config.enabled {
            log::info!("Response actions disabled. Would have unblocked {}", ip);
            return false;
        }

        let mut blocked = self.blocked.lock();
        if !blocked.contains_key(&ip) {
            log::info!("{} is not currently blocked", ip);
            return false;
        }

        let action = ResponseAction::UnblockIp { ip };
        match self.firewall.unblock(ip) {
            Ok(()) => {
                blocked.remove(&ip);
                drop(blocked);
                log::info!("Unblocked {} ({})", ip, reason);
                self.record(action, ActionStatus::Success, reason, "unblocked");
                true
            }
            Err(e) => {
                drop(blocked);
                log::error!("Failed to unblock {}: {}", ip, e);
                self.record(action, ActionStatus::Failed, reason, &e.to_string());
                false
            }
        }
    }

    /// Lift temporary blocks older than the configured duration
    pub fn check_and_unblock_expired(&self, now: i64) -> Vec<IpAddr> {
        let expired: Vec<IpAddr> = self
            .blocked
            .lock()
            .values()
            .filter(|b| !b.permanent && now - b.blocked_at >= self.config.temp_block_secs)
            .map(|b| b.ip)
            .collect();

        expired
            .into_iter()
            .filter(|ip| self.unblock_with_reason(*ip, REASON_EXPIRED))
            .collect()
    }

    /// Active blocks, oldest first
    pub fn blocked(&self) -> Vec<BlockEntry> {
        let mut list: Vec<BlockEntry> = self.blocked.lock().values().cloned().collect();
        list.sort_by(|a, b| a.blocked_at.cmp(&b.blocked_at).then(a.ip.cmp(&b.ip)));
        list
    }

    pub fn is_blocked(&self, ip: &IpAddr) -> bool {
        self.blocked.lock().contains_key(ip)
    }

    /// Most recent `limit` actions, oldest first
    pub fn history(&self, limit: usize) -> Vec<ActionResult> {
        let history = self.history.read();
        let start = history.len().saturating_sub(limit);
        history[start..].to_vec()
    }

    pub fn whitelist_ip(&self, ip: IpAddr) {
        self.whitelist.write().insert(ip);
        log::info!("Whitelisted {}", ip);
    }

    pub fn remove_from_whitelist(&self, ip: &IpAddr) -> bool {
        self.whitelist.write().remove(ip)
    }

    pub fn is_whitelisted(&self, ip: &IpAddr) -> bool {
        self.whitelist.read().contains(ip)
    }

    fn temporary_block(&self, ip: IpAddr, reason: &str) -> ActionResult {
        let now = Utc::now().timestamp();
        let ok = self.block_ip_at(ip, reason, false, now);
        ActionResult {
            action: ResponseAction::BlockIp { ip, permanent: false },
            status: if ok { ActionStatus::Success } else { ActionStatus::Failed },
            reason: reason.to_string(),
            message: if ok { "blocked".to_string() } else { "block failed".to_string() },
            timestamp: now,
        }
    }

    fn record(&self, action: ResponseAction, status: ActionStatus, reason: &str, message: &str) -> ActionResult {
        self.record_at(action, status, reason, message, Utc::now().timestamp())
    }

    fn record_at(&self, action: ResponseAction, status: ActionStatus, reason: &str, message: &str, now: i64) -> ActionResult {
        let result = ActionResult {
            action,
            status,
            reason: reason.to_string(),
            message: message.to_string(),
            timestamp: now,
        };
        log::debug!("Action {} {}: {}", result.action.action_type(), status.as_str(), result.action.description());

        let mut history = self.history.write();
        history.push(result.clone());
        let len = history.len();
        if len > MAX_HISTORY {
            history.drain(0..len - MAX_HISTORY);
        }
        result
    }
}
