use serde::{Deserialize, Serialize};

use crate::logic::engine::{DetectionEngine, EngineCounters};
use crate::logic::flow::AssemblerStats;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub version: String,
    pub accepting: bool,

    pub feature_version: u8,
    pub layout_hash: u32,
    pub feature_count: usize,

    pub flows: AssemblerStats,
    pub counters: EngineCounters,
    pub baseline: BaselineStatus,
    pub model: ModelStatus,
    pub alerts: AlertOverview,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineStatus {
    pub mode: String, // learning | enforcing
    pub learning_progress: f64,
    pub samples: u64,
    pub trusted_sources: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    pub scorers: Vec<ScorerStatus>,
    pub acceptance_threshold: f64,
    pub policy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerStatus {
    pub id: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertOverview {
    pub total: usize,
    pub unacknowledged: usize,
    pub blocked_sources: usize,
}

impl EngineStatus {
    pub fn collect(engine: &DetectionEngine) -> Self {
        let schema = engine.ensemble().schema();
        let baseline = engine.baseline().statistics();
        let ensemble = engine.ensemble().config();
        let alert_counts = engine.alerts().counts();

        Self {
            version: crate::constants::APP_VERSION.to_string(),
            accepting: engine.is_accepting(),
            feature_version: schema.version(),
            layout_hash: schema.layout_hash(),
            feature_count: schema.feature_count(),
            flows: engine.assembler_stats(),
            counters: engine.counters(),
            baseline: BaselineStatus {
                mode: if baseline.learning { "learning" } else { "enforcing" }.to_string(),
                learning_progress: baseline.learning_progress,
                samples: baseline.total_flows,
                trusted_sources: baseline.trusted_ips,
            },
            model: ModelStatus {
                scorers: engine
                    .ensemble()
                    .weights()
                    .into_iter()
                    .map(|(id, weight)| ScorerStatus { id, weight })
                    .collect(),
                acceptance_threshold: ensemble.acceptance_threshold,
                policy: format!("{:?}", ensemble.policy),
            },
            alerts: AlertOverview {
                total: alert_counts.total,
                unacknowledged: alert_counts.unacknowledged,
                blocked_sources: engine.response().blocked().len(),
            },
        }
    }
}
