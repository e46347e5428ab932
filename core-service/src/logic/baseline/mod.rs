//! Baseline Module - Adaptive False-Positive Suppression
//!
//! Learns which sources, flows and ports are normal for this network and
//! lowers the confidence of detections that match them. No scorer is
//! retrained; the baseline only adjusts and gates.
//!
//! # Architecture
//! - `types.rs`: `BaselineProfile`, `BaselineDecision`, `BaselineStatistics`
//! - `validate.rs`: format/version validation, `BaselineError`
//! - `storage.rs`: JSON persistence with atomic replace
//!
//! # Phases
//! - learning (`now - start < W`): every detection alerts, low-confidence
//!   or benign flows are learned
//! - enforcing: adjustments applied, suppressed flows are learned as benign
//!
//! # Failure Strategy
//! Unreadable or mismatched profile on load -> moved aside, fresh window.
//! Save failures are logged; the in-memory profile stays authoritative.

pub mod types;
pub mod validate;
pub mod storage;
#[cfg(test)]
mod tests;

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::logic::config::BaselineConfig;
use crate::logic::model::is_benign;
use crate::logic::{set_aside_corrupt, unix_now};

pub use types::{flow_key, BaselineDecision, BaselineProfile, BaselineStatistics};
pub use validate::BaselineError;

// ============================================================================
// CONSTANTS
// ============================================================================

const REASON_LEARNING: &str = "learning_mode";
const REASON_TRUSTED: &str = "trusted_source";
const REASON_COMMON_FLOW: &str = "common_flow";
const REASON_COMMON_PORT: &str = "common_port";
const REASON_NO_MATCH: &str = "no_baseline_match";

const TOP_PORTS: usize = 10;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Addressing of one evaluated flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowEndpoints {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
}

impl FlowEndpoints {
    pub fn new(src: IpAddr, dst: IpAddr, src_port: u16, dst_port: u16) -> Self {
        Self { src, dst, src_port, dst_port }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct AdaptiveBaseline {
    config: BaselineConfig,
    path: Option<PathBuf>,
    profile: Mutex<BaselineProfile>,
}

impl AdaptiveBaseline {
    /// Open the baseline at `path`, or start a fresh learning window now
    pub fn open(config: BaselineConfig, path: Option<PathBuf>) -> Self {
        Self::open_at(config, path, unix_now())
    }

    /// Like `open`, with an explicit clock for a fresh window
    ///
    /// An unreadable or mismatched file is moved aside before the fresh
    /// window can overwrite it.
    pub fn open_at(config: BaselineConfig, path: Option<PathBuf>, now: f64) -> Self {
        let mut path = path;
        let profile = match path.clone().as_deref() {
            Some(p) if p.exists() => match storage::load_baseline(p) {
                Ok(profile) => {
                    log::info!(
                        "Loaded baseline {} ({} flows, {} trusted sources, learning={})",
                        profile.id,
                        profile.statistics.total_flows,
                        profile.trusted_ips.len(),
                        profile.is_learning(now)
                    );
                    profile
                }
                Err(e) => {
                    log::warn!("Baseline load failed/invalid: {}. Starting a new learning window.", e);
                    match set_aside_corrupt(p) {
                        Ok(moved) => log::warn!("Previous baseline kept at {}", moved.display()),
                        Err(err) => {
                            log::error!(
                                "Cannot move {} aside: {}. Baseline stays in memory only.",
                                p.display(),
                                err
                            );
                            path = None;
                        }
                    }
                    BaselineProfile::new(now, config.learning_period_secs)
                }
            },
            _ => {
                log::info!(
                    "Starting baseline learning window ({}s)",
                    config.learning_period_secs
                );
                BaselineProfile::new(now, config.learning_period_secs)
            }
        };

        Self {
            config,
            path,
            profile: Mutex::new(profile),
        }
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record one observed flow
    pub fn learn(&self, endpoints: &FlowEndpoints, benign: bool) {
        let mut profile = self.profile.lock();
        self.learn_locked(&mut profile, endpoints, benign);
    }

    /// Gate one detection against the learned profile
    pub fn evaluate(
        &self,
        endpoints: &FlowEndpoints,
        label: &str,
        confidence: f64,
        packet_count: u64,
    ) -> BaselineDecision {
        self.evaluate_at(endpoints, label, confidence, packet_count, unix_now())
    }

    /// `evaluate` with an explicit clock
    ///
    /// Reading the profile, computing the adjustment and learning the flow
    /// happen under one lock.
    pub fn evaluate_at(
        &self,
        endpoints: &FlowEndpoints,
        label: &str,
        confidence: f64,
        packet_count: u64,
        now: f64,
    ) -> BaselineDecision {
        let mut profile = self.profile.lock();

        if profile.is_learning(now) {
            let learned = confidence < self.config.alert_threshold || is_benign(label);
            if learned {
                self.learn_locked(&mut profile, endpoints, true);
            }
            return BaselineDecision {
                should_alert: true,
                original_confidence: confidence,
                adjusted_confidence: confidence,
                reason: REASON_LEARNING.to_string(),
                learning: true,
                learning_progress: Some(profile.learning_progress(now)),
                learned,
            };
        }

        let mut adjustment = 0.0;
        let mut reasons: Vec<&str> = Vec::new();

        if profile.is_trusted(&endpoints.src) {
            adjustment += self.config.trusted_adjustment;
            reasons.push(REASON_TRUSTED);
        }
        if profile.flow_count(&endpoints.src, &endpoints.dst, endpoints.dst_port) >= self.config.common_flow_min {
            adjustment += self.config.common_flow_adjustment;
            reasons.push(REASON_COMMON_FLOW);
        }
        if profile.port_count(endpoints.dst_port) >= self.config.common_port_min {
            adjustment += self.config.common_port_adjustment;
            reasons.push(REASON_COMMON_PORT);
        }

        let adjusted = (confidence + adjustment).max(0.0);
        let should_alert = adjusted >= self.config.alert_threshold;
        let reason = if reasons.is_empty() {
            REASON_NO_MATCH.to_string()
        } else {
            reasons.join(" + ")
        };

        if !should_alert {
            log::info!(
                "Suppressed {} from {} -> {}:{} ({} packets): {:.2} -> {:.2} [{}]",
                label,
                endpoints.src,
                endpoints.dst,
                endpoints.dst_port,
                packet_count,
                confidence,
                adjusted,
                reason
            );
            self.learn_locked(&mut profile, endpoints, true);
        }

        BaselineDecision {
            should_alert,
            original_confidence: confidence,
            adjusted_confidence: adjusted,
            reason,
            learning: false,
            learning_progress: None,
            learned: !should_alert,
        }
    }

    fn learn_locked(&self, profile: &mut BaselineProfile, endpoints: &FlowEndpoints, benign: bool) {
        profile.statistics.total_flows += 1;

        if benign {
            profile.statistics.benign_flows += 1;
            profile.trusted_ips.insert(endpoints.src.to_string());
            *profile
                .common_flows
                .entry(flow_key(&endpoints.src, &endpoints.dst, endpoints.dst_port))
                .or_insert(0) += 1;
            *profile.port_usage.entry(endpoints.dst_port).or_insert(0) += 1;
        } else {
            profile.statistics.threat_flows += 1;
        }

        let every = self.config.save_every.max(1);
        if profile.statistics.total_flows % every == 0 {
            self.save_locked(profile);
        }
    }

    fn save_locked(&self, profile: &BaselineProfile) {
        if let Some(path) = &self.path {
            if let Err(e) = storage::save_baseline(profile, path) {
                log::error!("Failed to save baseline: {}", e);
            }
        }
    }

    /// Persist the current profile now
    pub fn flush(&self) -> Result<(), BaselineError> {
        let profile = self.profile.lock();
        match &self.path {
            Some(path) => storage::save_baseline(&profile, path),
            None => Ok(()),
        }
    }

    pub fn is_learning(&self, now: f64) -> bool {
        self.profile.lock().is_learning(now)
    }

    /// Copy of the current profile
    pub fn profile(&self) -> BaselineProfile {
        self.profile.lock().clone()
    }

    pub fn statistics(&self) -> BaselineStatistics {
        self.statistics_at(unix_now())
    }

    pub fn statistics_at(&self, now: f64) -> BaselineStatistics {
        let profile = self.profile.lock();

        let mut top_ports: Vec<(u16, u64)> = profile.port_usage.iter().map(|(p, c)| (*p, *c)).collect();
        top_ports.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        top_ports.truncate(TOP_PORTS);

        BaselineStatistics {
            profile_id: profile.id,
            learning: profile.is_learning(now),
            learning_progress: profile.learning_progress(now),
            total_flows: profile.statistics.total_flows,
            benign_flows: profile.statistics.benign_flows,
            threat_flows: profile.statistics.threat_flows,
            trusted_ips: profile.trusted_ips.len(),
            common_flows: profile.common_flows.len(),
            ports_tracked: profile.port_usage.len(),
            top_ports,
        }
    }

    /// Forget everything and restart the learning window
    pub fn reset(&self) -> Result<(), BaselineError> {
        self.reset_at(unix_now())
    }

    pub fn reset_at(&self, now: f64) -> Result<(), BaselineError> {
        let mut profile = self.profile.lock();
        *profile = BaselineProfile::new(now, self.config.learning_period_secs);
        if let Some(path) = &self.path {
            storage::delete_baseline(path)?;
        }
        log::info!("Baseline reset, new learning window started");
        Ok(())
    }
}
