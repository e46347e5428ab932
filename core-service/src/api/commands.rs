//! Query surface over a running engine
//!
//! Plain functions over `&DetectionEngine` returning `Result<_, String>`,
//! so any front end (CLI, RPC layer) can expose them unchanged.

use std::net::IpAddr;

use chrono::Utc;

use crate::logic::alerts::{Alert, AlertCounts, AlertFilter};
use crate::logic::baseline::BaselineStatistics;
use crate::logic::engine::{DetectionEngine, EngineCounters, MaintenanceReport};
use crate::logic::flow::FlowSummary;
use crate::logic::response::{ActionResult, BlockEntry};
use crate::logic::statistics::{RealTimeStats, StatisticsSummary, SummaryPeriod};

use super::engine_status::EngineStatus;

const DEFAULT_ALERT_LIMIT: usize = 100;
const DEFAULT_FLOW_LIMIT: usize = 50;

// ============================================================================
// ENGINE COMMANDS
// ============================================================================

/// Full engine status
pub fn get_engine_status(engine: &DetectionEngine) -> Result<EngineStatus, String> {
    Ok(EngineStatus::collect(engine))
}

pub fn get_engine_counters(engine: &DetectionEngine) -> Result<EngineCounters, String> {
    Ok(engine.counters())
}

/// Largest live flows first
pub fn get_active_flows(engine: &DetectionEngine, limit: Option<usize>) -> Result<Vec<FlowSummary>, String> {
    Ok(engine.flow_summaries(limit.unwrap_or(DEFAULT_FLOW_LIMIT)))
}

/// Run one maintenance pass now
pub fn run_maintenance(engine: &DetectionEngine) -> Result<MaintenanceReport, String> {
    Ok(engine.run_maintenance(Utc::now()))
}

// ============================================================================
// ALERT COMMANDS
// ============================================================================

/// Newest first, conjunction of the filter's predicates
pub fn get_alerts(
    engine: &DetectionEngine,
    filter: Option<AlertFilter>,
    limit: Option<usize>,
) -> Result<Vec<Alert>, String> {
    let filter = filter.unwrap_or_default();
    Ok(engine.alerts().query(&filter, limit.unwrap_or(DEFAULT_ALERT_LIMIT)))
}

pub fn get_alert(engine: &DetectionEngine, alert_id: u64) -> Result<Alert, String> {
    engine
        .alerts()
        .get(alert_id)
        .ok_or_else(|| format!("alert {} not found", alert_id))
}

pub fn acknowledge_alert(
    engine: &DetectionEngine,
    alert_id: u64,
    user: String,
    notes: Option<String>,
) -> Result<bool, String> {
    if engine.alerts().acknowledge(alert_id, &user, notes.as_deref()) {
        Ok(true)
    } else {
        Err(format!("alert {} not found", alert_id))
    }
}

/// `status`: new | investigating | resolved | false_positive
pub fn update_alert_status(
    engine: &DetectionEngine,
    alert_id: u64,
    status: String,
    notes: Option<String>,
) -> Result<bool, String> {
    engine
        .alerts()
        .update_status(alert_id, &status, notes.as_deref())
        .map(|_| true)
        .map_err(|e| e.to_string())
}

pub fn get_alert_counts(engine: &DetectionEngine) -> Result<AlertCounts, String> {
    Ok(engine.alerts().counts())
}

// ============================================================================
// STATISTICS COMMANDS
// ============================================================================

/// `period`: hourly | daily | weekly | all
pub fn get_statistics(engine: &DetectionEngine, period: Option<String>) -> Result<StatisticsSummary, String> {
    let period = match period {
        Some(p) => p.parse::<SummaryPeriod>()?,
        None => SummaryPeriod::All,
    };
    Ok(engine.statistics().summary(period))
}

pub fn get_realtime_statistics(engine: &DetectionEngine) -> Result<RealTimeStats, String> {
    Ok(engine.statistics().real_time())
}

pub fn reset_statistics(engine: &DetectionEngine) -> Result<bool, String> {
    engine.statistics().reset();
    Ok(true)
}

// ============================================================================
// BASELINE COMMANDS
// ============================================================================

pub fn get_baseline_statistics(engine: &DetectionEngine) -> Result<BaselineStatistics, String> {
    Ok(engine.baseline().statistics())
}

/// Forget the learned profile and start a new learning window
pub fn reset_baseline(engine: &DetectionEngine) -> Result<bool, String> {
    engine.baseline().reset().map(|_| true).map_err(|e| e.to_string())
}

// ============================================================================
// RESPONSE COMMANDS
// ============================================================================

pub fn get_blocked_ips(engine: &DetectionEngine) -> Result<Vec<BlockEntry>, String> {
    Ok(engine.response().blocked())
}

pub fn block_ip(engine: &DetectionEngine, ip: String, reason: Option<String>, permanent: bool) -> Result<bool, String> {
    let addr = parse_ip(&ip)?;
    Ok(engine
        .response()
        .block_ip(addr, reason.as_deref().unwrap_or("manual"), permanent))
}

pub fn unblock_ip(engine: &DetectionEngine, ip: String) -> Result<bool, String> {
    let addr = parse_ip(&ip)?;
    Ok(engine.response().unblock_ip(addr))
}

pub fn whitelist_ip(engine: &DetectionEngine, ip: String) -> Result<bool, String> {
    let addr = parse_ip(&ip)?;
    engine.response().whitelist_ip(addr);
    Ok(true)
}

pub fn remove_from_whitelist(engine: &DetectionEngine, ip: String) -> Result<bool, String> {
    let addr = parse_ip(&ip)?;
    Ok(engine.response().remove_from_whitelist(&addr))
}

pub fn get_action_history(engine: &DetectionEngine, limit: Option<usize>) -> Result<Vec<ActionResult>, String> {
    Ok(engine.response().history(limit.unwrap_or(DEFAULT_ALERT_LIMIT)))
}

fn parse_ip(ip: &str) -> Result<IpAddr, String> {
    ip.trim()
        .parse::<IpAddr>()
        .map_err(|_| format!("invalid IP address '{}'", ip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::alerts::{AlertStatus, Detection};
    use crate::logic::config::EngineConfig;
    use crate::logic::features::FeatureSchema;
    use crate::logic::model::{RuleScorer, Severity};

    fn engine() -> DetectionEngine {
        DetectionEngine::builder(EngineConfig::default())
            .scorer(Box::new(RuleScorer::new(FeatureSchema::Ciciot37).unwrap()))
            .build()
            .unwrap()
    }

    fn detection(src: &str, severity: Severity) -> Detection {
        Detection {
            threat: "DDoS-SYN_Flood".to_string(),
            severity,
            src_ip: src.to_string(),
            dst_ip: "10.0.0.1".to_string(),
            dst_port: Some(80),
            context: String::new(),
            confidence: 0.9,
            method: "rules_only".to_string(),
        }
    }

    #[test]
    fn test_alert_commands() {
        let engine = engine();
        let id = engine.alerts().add(detection("203.0.113.5", Severity::High));
        engine.alerts().add(detection("203.0.113.6", Severity::Low));

        let high = get_alerts(
            &engine,
            Some(AlertFilter { severity: Some(Severity::High), ..Default::default() }),
            None,
        )
        .unwrap();
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].id, id);

        assert!(acknowledge_alert(&engine, id, "analyst".to_string(), None).unwrap());
        assert!(acknowledge_alert(&engine, 999, "analyst".to_string(), None).is_err());

        assert!(update_alert_status(&engine, id, "resolved".to_string(), Some("done".to_string())).unwrap());
        assert!(update_alert_status(&engine, id, "closed".to_string(), None).is_err());
        assert_eq!(get_alert(&engine, id).unwrap().status, AlertStatus::Resolved);

        let counts = get_alert_counts(&engine).unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.unacknowledged, 1);
        assert_eq!(counts.by_severity[&Severity::High], 1);
        assert_eq!(counts.by_severity[&Severity::Medium], 0);
    }

    #[test]
    fn test_statistics_period_parsing() {
        let engine = engine();
        assert!(get_statistics(&engine, Some("daily".to_string())).is_ok());
        assert!(get_statistics(&engine, None).is_ok());
        assert!(get_statistics(&engine, Some("monthly".to_string())).is_err());
    }

    #[test]
    fn test_block_commands() {
        let engine = engine();
        assert!(block_ip(&engine, "not-an-ip".to_string(), None, false).is_err());
        assert!(block_ip(&engine, "198.51.100.7".to_string(), None, false).unwrap());
        assert_eq!(get_blocked_ips(&engine).unwrap().len(), 1);
        assert!(unblock_ip(&engine, "198.51.100.7".to_string()).unwrap());
        assert!(get_blocked_ips(&engine).unwrap().is_empty());
        assert_eq!(get_action_history(&engine, None).unwrap().len(), 2);
    }

    #[test]
    fn test_engine_status() {
        let engine = engine();
        let status = get_engine_status(&engine).unwrap();
        assert!(status.accepting);
        assert_eq!(status.feature_count, FeatureSchema::Ciciot37.feature_count());
        assert_eq!(status.baseline.mode, "learning");
        assert_eq!(status.model.scorers.len(), 1);
        assert!((status.model.scorers[0].weight - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_baseline_and_counter_commands() {
        let engine = engine();
        let stats = get_baseline_statistics(&engine).unwrap();
        assert!(stats.learning);
        assert_eq!(stats.total_flows, 0);
        assert!(reset_baseline(&engine).unwrap());

        assert_eq!(get_engine_counters(&engine).unwrap(), EngineCounters::default());
        assert!(get_active_flows(&engine, Some(5)).unwrap().is_empty());

        engine.alerts().add(detection("203.0.113.5", Severity::High));
        assert!(reset_statistics(&engine).unwrap());
        assert_eq!(get_statistics(&engine, None).unwrap().total_alerts(), 0);
        assert!(get_realtime_statistics(&engine).is_ok());
        assert!(run_maintenance(&engine).unwrap().unblocked.is_empty());
    }
}
