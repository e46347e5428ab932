//! Engine Module - the pipeline handle
//!
//! `DetectionEngine` owns every stage (flow table, ensemble, baseline,
//! alerts, statistics, response, notifier). Nothing is global; callers
//! hold an `Arc<DetectionEngine>` and pass it to the query surface and
//! the maintenance thread.
//!
//! Hot path per packet, all under the pipeline lock:
//! ingest → (every Nth packet) features → ensemble → baseline → alert →
//! statistics/response/notify.


use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logic::alerts::{AlertManager, Detection};
use crate::logic::baseline::{AdaptiveBaseline, BaselineDecision, FlowEndpoints};
use crate::logic::config::EngineConfig;
use crate::logic::features::FeatureEngine;
use crate::logic::flow::{AssemblerStats, FlowAssembler, FlowSnapshot, FlowSummary, IngestOutcome};
use crate::logic::model::{
    EnsembleEngine, EnsembleError, EnsembleResult, Instrumentation, LogInstrumentation, Scorer,
};
use crate::logic::packet::{FlowKey, Packet};
use crate::logic::response::{DryRunFirewall, Firewall, LogNotifier, Notifier, ResponseActionManager};
use crate::logic::statistics::StatisticsTracker;

// ============================================================================
// ERRORS & OUTCOMES
// ============================================================================

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("ensemble setup failed: {0}")]
    Ensemble(#[from] EnsembleError),
}

/// A snapshot that made it through scoring
#[derive(Debug, Clone, Serialize)]
pub struct ScoredFlow {
    pub key: FlowKey,
    pub dst_port: u16,
    pub packet_count: u64,
    pub result: EnsembleResult,
    /// `None` for benign verdicts, which are learned directly
    pub decision: Option<BaselineDecision>,
    pub alert_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub enum PacketOutcome {
    /// Engine is draining
    Rejected,
    /// No flow key could be derived
    Dropped,
    Accumulated { packet_count: u64 },
    /// Snapshot could not be scored; the flow keeps accumulating
    ScoringFailed { error: String },
    Scored(Box<ScoredFlow>),
}

#[derive(Default)]
struct Counters {
    packets: AtomicU64,
    rejected: AtomicU64,
    snapshots: AtomicU64,
    scoring_failures: AtomicU64,
    benign: AtomicU64,
    alerts: AtomicU64,
    suppressed: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCounters {
    pub packets: u64,
    pub rejected: u64,
    pub snapshots: u64,
    pub scoring_failures: u64,
    pub benign: u64,
    pub alerts: u64,
    pub suppressed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub unblocked: Vec<String>,
    pub alerts_pruned: usize,
    pub flows_evicted: usize,
}

// ============================================================================
// BUILDER
// ============================================================================

pub struct EngineBuilder {
    config: EngineConfig,
    scorers: Vec<Box<dyn Scorer>>,
    firewall: Option<Arc<dyn Firewall>>,
    notifier: Option<Box<dyn Notifier>>,
    instrumentation: Option<Box<dyn Instrumentation>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            scorers: Vec::new(),
            firewall: None,
            notifier: None,
            instrumentation: None,
        }
    }

    pub fn scorer(mut self, scorer: Box<dyn Scorer>) -> Self {
        self.scorers.push(scorer);
        self
    }

    pub fn scorers(mut self, scorers: Vec<Box<dyn Scorer>>) -> Self {
        self.scorers.extend(scorers);
        self
    }

    pub fn firewall(mut self, firewall: Arc<dyn Firewall>) -> Self {
        self.firewall = Some(firewall);
        self
    }

    pub fn notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn instrumentation(mut self, instrumentation: Box<dyn Instrumentation>) -> Self {
        self.instrumentation = Some(instrumentation);
        self
    }

    pub fn build(self) -> Result<DetectionEngine, EngineError> {
        let config = self.config;

        let instrumentation = self.instrumentation.unwrap_or_else(|| Box::new(LogInstrumentation));
        let ensemble = EnsembleEngine::with_instrumentation(
            self.scorers,
            config.schema,
            config.ensemble.clone(),
            instrumentation,
        )?;
        log::info!(
            "{} engine starting: {}",
            crate::constants::APP_NAME,
            config.describe_generation_for(&ensemble.scorer_ids())
        );

        let assembler = FlowAssembler::new(config.flow.clone(), FeatureEngine::new(config.schema));
        let baseline = AdaptiveBaseline::open(config.baseline.clone(), config.baseline_path());
        let alerts = AlertManager::open(config.alerts.clone(), config.alerts_path());
        let statistics = StatisticsTracker::open(config.statistics_path());
        let firewall = self.firewall.unwrap_or_else(|| Arc::new(DryRunFirewall::new()));
        let response = ResponseActionManager::new(config.response.clone(), firewall);
        let notifier = self.notifier.unwrap_or_else(|| Box::new(LogNotifier::new()));

        Ok(DetectionEngine {
            config,
            pipeline: Mutex::new(assembler),
            ensemble,
            baseline,
            alerts,
            statistics,
            response,
            notifier,
            accepting: AtomicBool::new(true),
            counters: Counters::default(),
        })
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct DetectionEngine {
    config: EngineConfig,
    pipeline: Mutex<FlowAssembler>,
    ensemble: EnsembleEngine,
    baseline: AdaptiveBaseline,
    alerts: AlertManager,
    statistics: StatisticsTracker,
    response: ResponseActionManager,
    notifier: Box<dyn Notifier>,
    accepting: AtomicBool,
    counters: Counters,
}

impl DetectionEngine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Run one packet through the pipeline
    pub fn process_packet(&self, packet: Packet) -> PacketOutcome {
        if !self.accepting.load(Ordering::SeqCst) {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return PacketOutcome::Rejected;
        }

        let mut pipeline = self.pipeline.lock();
        // re-check under the lock so nothing slips in after drain
        if !self.accepting.load(Ordering::SeqCst) {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return PacketOutcome::Rejected;
        }
        self.counters.packets.fetch_add(1, Ordering::Relaxed);

        let snapshot = match pipeline.ingest(packet) {
            IngestOutcome::Dropped => return PacketOutcome::Dropped,
            IngestOutcome::Accumulated { packet_count, .. } => return PacketOutcome::Accumulated { packet_count },
            IngestOutcome::Snapshot(snapshot) => snapshot,
        };

        self.counters.snapshots.fetch_add(1, Ordering::Relaxed);
        self.score_snapshot(snapshot)
    }

    fn score_snapshot(&self, snapshot: FlowSnapshot) -> PacketOutcome {
        let result = match self.ensemble.evaluate(&snapshot.features) {
            Ok(result) => result,
            Err(e) => {
                self.counters.scoring_failures.fetch_add(1, Ordering::Relaxed);
                log::warn!("Scoring {} skipped: {}", snapshot.key, e);
                return PacketOutcome::ScoringFailed { error: e.to_string() };
            }
        };

        let FlowSnapshot { key, dst_port, packet_count, .. } = snapshot;
        let endpoints = FlowEndpoints::new(key.src, key.dst, key.src_port, dst_port);

        if result.is_benign() {
            self.counters.benign.fetch_add(1, Ordering::Relaxed);
            self.baseline.learn(&endpoints, true);
            return PacketOutcome::Scored(Box::new(ScoredFlow {
                key,
                dst_port,
                packet_count,
                result,
                decision: None,
                alert_id: None,
            }));
        }

        let decision = self.baseline.evaluate(&endpoints, &result.label, result.confidence, packet_count);
        let alert_id = if decision.should_alert {
            if !decision.learned {
                self.baseline.learn(&endpoints, false);
            }
            Some(self.raise_alert(&key, dst_port, packet_count, &result, &decision))
        } else {
            self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
            None
        };

        PacketOutcome::Scored(Box::new(ScoredFlow {
            key,
            dst_port,
            packet_count,
            result,
            decision: Some(decision),
            alert_id,
        }))
    }

    fn raise_alert(
        &self,
        key: &FlowKey,
        dst_port: u16,
        packet_count: u64,
        result: &EnsembleResult,
        decision: &BaselineDecision,
    ) -> u64 {
        let detection = Detection {
            threat: result.label.clone(),
            severity: result.severity,
            src_ip: key.src.to_string(),
            dst_ip: key.dst.to_string(),
            dst_port: Some(dst_port),
            context: format!(
                "{} packets, proto {}, baseline {} ({:.2} -> {:.2})",
                packet_count,
                key.protocol,
                decision.reason,
                decision.original_confidence,
                decision.adjusted_confidence
            ),
            confidence: decision.adjusted_confidence,
            method: result.method.to_string(),
        };

        let id = self.alerts.add(detection);
        self.counters.alerts.fetch_add(1, Ordering::Relaxed);

        if let Some(alert) = self.alerts.get(id) {
            self.statistics.record_alert(&alert);
            if self.config.response.enabled {
                let response = self.response.handle_threat(&alert);
                log::debug!("Alert #{} response: {} action(s), success={}", id, response.actions_taken.len(), response.success);
            }
            self.notifier.notify(&alert, self.config.notify.severity_threshold);
        }
        id
    }

    /// Stop accepting packets, wait for the in-flight one, flush state
    pub fn drain(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        let pipeline = self.pipeline.lock();

        if let Err(e) = self.baseline.flush() {
            log::error!("Failed to flush baseline: {}", e);
        }
        if let Err(e) = self.alerts.flush() {
            log::error!("Failed to flush alerts: {}", e);
        }
        if let Err(e) = self.statistics.flush() {
            log::error!("Failed to flush statistics: {}", e);
        }

        let counters = self.counters();
        log::info!(
            "Engine drained: {} packets, {} snapshots, {} alerts, {} suppressed, {} active flows",
            counters.packets,
            counters.snapshots,
            counters.alerts,
            counters.suppressed,
            pipeline.len()
        );
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Expired blocks, alert retention, idle flows
    pub fn run_maintenance(&self, now: DateTime<Utc>) -> MaintenanceReport {
        let unblocked = self
            .response
            .check_and_unblock_expired(now.timestamp())
            .into_iter()
            .map(|ip| ip.to_string())
            .collect();
        let alerts_pruned = self.alerts.prune_expired(now);

        let flows_evicted = {
            let mut pipeline = self.pipeline.lock();
            match pipeline.clock() {
                Some(clock) => pipeline.evict_idle(clock),
                None => 0,
            }
        };

        let report = MaintenanceReport { unblocked, alerts_pruned, flows_evicted };
        log::debug!("Maintenance: {:?}", report);
        report
    }

    pub fn counters(&self) -> EngineCounters {
        let c = &self.counters;
        EngineCounters {
            packets: c.packets.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            snapshots: c.snapshots.load(Ordering::Relaxed),
            scoring_failures: c.scoring_failures.load(Ordering::Relaxed),
            benign: c.benign.load(Ordering::Relaxed),
            alerts: c.alerts.load(Ordering::Relaxed),
            suppressed: c.suppressed.load(Ordering::Relaxed),
        }
    }

    pub fn flow_summaries(&self, limit: usize) -> Vec<FlowSummary> {
        self.pipeline.lock().summaries(limit)
    }

    pub fn assembler_stats(&self) -> AssemblerStats {
        self.pipeline.lock().stats()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ensemble(&self) -> &EnsembleEngine {
        &self.ensemble
    }

    pub fn baseline(&self) -> &AdaptiveBaseline {
        &self.baseline
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    pub fn statistics(&self) -> &StatisticsTracker {
        &self.statistics
    }

    pub fn response(&self) -> &ResponseActionManager {
        &self.response
    }
}
