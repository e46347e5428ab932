use super::*;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tempfile::tempdir;

const START: f64 = 1_700_000_000.0;
const WINDOW: f64 = 3600.0;

fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 168, 1, last))
}

fn endpoints(src: u8, dst: u8, dst_port: u16) -> FlowEndpoints {
    FlowEndpoints::new(ip(src), ip(dst), 40000, dst_port)
}

fn config() -> BaselineConfig {
    BaselineConfig {
        learning_period_secs: WINDOW,
        ..BaselineConfig::default()
    }
}

fn in_memory() -> AdaptiveBaseline {
    AdaptiveBaseline::open_at(config(), None, START)
}

fn after_window() -> f64 {
    START + WINDOW + 1.0
}

#[test]
fn test_learning_window_always_alerts() {
    let baseline = in_memory();
    let flow = endpoints(10, 20, 443);

    for _ in 0..60 {
        baseline.learn(&flow, true);
    }

    for conf in [0.1, 0.5, 0.86, 0.99] {
        let d = baseline.evaluate_at(&flow, "DDoS-SYN_Flood", conf, 10, START + 10.0);
        assert!(d.should_alert);
        assert!(d.learning);
        assert_eq!(d.reason, "learning_mode");
        assert_eq!(d.adjusted_confidence, conf);
        assert!(d.learning_progress.is_some());
    }
}

#[test]
fn test_learning_window_learns_low_confidence_and_benign() {
    let baseline = in_memory();
    let flow = endpoints(10, 20, 443);

    baseline.evaluate_at(&flow, "DDoS-SYN_Flood", 0.5, 10, START + 1.0);
    baseline.evaluate_at(&flow, "BenignTraffic", 0.95, 10, START + 2.0);
    // confident threat is not learned
    baseline.evaluate_at(&flow, "DDoS-SYN_Flood", 0.95, 10, START + 3.0);

    let profile = baseline.profile();
    assert_eq!(profile.statistics.total_flows, 2);
    assert_eq!(profile.flow_count(&ip(10), &ip(20), 443), 2);
    assert!(profile.is_trusted(&ip(10)));
}

#[test]
fn test_full_adjustment_suppresses() {
    let baseline = in_memory();
    let flow = endpoints(10, 20, 443);

    // 10 learns of the exact triple and 40 more to the port from elsewhere
    for _ in 0..10 {
        baseline.learn(&flow, true);
    }
    for i in 0..40 {
        baseline.learn(&endpoints(100 + (i % 50) as u8, 30, 443), true);
    }

    let d = baseline.evaluate_at(&flow, "DDoS-SYN_Flood", 0.96, 10, after_window());
    assert!(!d.learning);
    assert!((d.adjusted_confidence - 0.51).abs() < 1e-9);
    assert!(!d.should_alert);
    assert_eq!(d.reason, "trusted_source + common_flow + common_port");
    assert_eq!(d.original_confidence, 0.96);
}

#[test]
fn test_suppressed_flow_is_learned() {
    let baseline = in_memory();
    let flow = endpoints(10, 20, 443);
    for _ in 0..10 {
        baseline.learn(&flow, true);
    }
    let before = baseline.profile().flow_count(&ip(10), &ip(20), 443);

    let d = baseline.evaluate_at(&flow, "Recon-PortScan", 0.9, 10, after_window());
    assert!(!d.should_alert);

    assert_eq!(baseline.profile().flow_count(&ip(10), &ip(20), 443), before + 1);
}

#[test]
fn test_unknown_flow_keeps_confidence() {
    let baseline = in_memory();
    let d = baseline.evaluate_at(&endpoints(1, 2, 8080), "DDoS-SYN_Flood", 0.9, 10, after_window());

    assert!(d.should_alert);
    assert_eq!(d.adjusted_confidence, 0.9);
    assert_eq!(d.reason, "no_baseline_match");
    // alerted flows are not learned
    assert_eq!(baseline.profile().statistics.total_flows, 0);
}

#[test]
fn test_adjusted_confidence_floor_is_zero() {
    let baseline = in_memory();
    let flow = endpoints(10, 20, 443);
    for _ in 0..50 {
        baseline.learn(&flow, true);
    }

    let d = baseline.evaluate_at(&flow, "DDoS-SYN_Flood", 0.2, 10, after_window());
    assert_eq!(d.adjusted_confidence, 0.0);
    assert!(!d.should_alert);
}

#[test]
fn test_threat_learn_only_counts() {
    let baseline = in_memory();
    baseline.learn(&endpoints(10, 20, 22), false);

    let profile = baseline.profile();
    assert_eq!(profile.statistics.threat_flows, 1);
    assert_eq!(profile.statistics.total_flows, 1);
    assert!(profile.trusted_ips.is_empty());
    assert!(profile.port_usage.is_empty());
}

#[test]
fn test_save_load_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("baseline.json");

    let baseline = AdaptiveBaseline::open_at(config(), Some(path.clone()), START);
    baseline.learn(&endpoints(10, 20, 443), true);
    baseline.learn(&endpoints(11, 20, 53), true);
    baseline.learn(&endpoints(10, 20, 443), true);
    baseline.learn(&endpoints(12, 20, 23), false);
    baseline.flush().unwrap();

    let original = baseline.profile();
    let reloaded = AdaptiveBaseline::open_at(config(), Some(path), START + 99.0).profile();

    assert_eq!(reloaded.trusted_ips, original.trusted_ips);
    assert_eq!(reloaded.common_flows, original.common_flows);
    assert_eq!(reloaded.port_usage, original.port_usage);
    assert_eq!(reloaded.statistics, original.statistics);
    assert_eq!(reloaded.start_time, START);
    assert_eq!(reloaded.id, original.id);
}

#[test]
fn test_periodic_save() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("baseline.json");
    let cfg = BaselineConfig {
        save_every: 5,
        ..config()
    };

    let baseline = AdaptiveBaseline::open_at(cfg, Some(path.clone()), START);
    for _ in 0..4 {
        baseline.learn(&endpoints(10, 20, 443), true);
    }
    assert!(!path.exists());

    baseline.learn(&endpoints(10, 20, 443), true);
    assert!(path.exists());
    let saved = storage::load_baseline(&path).unwrap();
    assert_eq!(saved.statistics.total_flows, 5);
}

#[test]
fn test_json_shape() {
    let mut profile = BaselineProfile::new(START, WINDOW);
    profile.trusted_ips.insert("10.0.0.1".to_string());
    profile.common_flows.insert(flow_key(&ip(1), &ip(2), 80), 3);
    profile.port_usage.insert(80, 3);

    let value = serde_json::to_value(&profile).unwrap();
    assert_eq!(value["common_flows"]["192.168.1.1|192.168.1.2|80"], 3);
    assert_eq!(value["port_usage"]["80"], 3);
    assert_eq!(value["trusted_ips"][0], "10.0.0.1");
    assert_eq!(value["learning_period"], WINDOW);
    assert_eq!(value["version"], 1);
}

#[test]
fn test_corrupt_file_starts_fresh() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("baseline.json");
    std::fs::write(&path, b"{not json").unwrap();

    let baseline = AdaptiveBaseline::open_at(config(), Some(path.clone()), START);
    assert!(baseline.is_learning(START + 1.0));
    assert_eq!(baseline.profile().statistics.total_flows, 0);

    // a flush writes the fresh profile without touching the unreadable one
    baseline.flush().unwrap();
    let kept: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.file_name().unwrap().to_string_lossy().starts_with("baseline.json.corrupt-"))
        .collect();
    assert_eq!(kept.len(), 1);
    assert_eq!(std::fs::read(&kept[0]).unwrap(), b"{not json");
    assert!(storage::load_baseline(&path).is_ok());
}

#[test]
fn test_version_mismatch_rejected() {
    let mut profile = BaselineProfile::new(START, WINDOW);
    profile.version = 99;
    assert!(matches!(
        validate::validate_baseline(&profile),
        Err(BaselineError::VersionMismatch { expected: 1, actual: 99 })
    ));
}

#[test]
fn test_statistics_and_reset() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("baseline.json");
    let baseline = AdaptiveBaseline::open_at(config(), Some(path.clone()), START);

    for port in 1..=12u16 {
        for _ in 0..port {
            baseline.learn(&endpoints(10, 20, port), true);
        }
    }
    baseline.flush().unwrap();

    let stats = baseline.statistics_at(START + WINDOW / 2.0);
    assert!(stats.learning);
    assert!((stats.learning_progress - 0.5).abs() < 1e-9);
    assert_eq!(stats.trusted_ips, 1);
    assert_eq!(stats.ports_tracked, 12);
    assert_eq!(stats.top_ports.len(), 10);
    assert_eq!(stats.top_ports[0], (12, 12));

    let old_id = baseline.profile().id;
    baseline.reset_at(START + 10_000.0).unwrap();
    assert!(!path.exists());
    let profile = baseline.profile();
    assert_ne!(profile.id, old_id);
    assert_eq!(profile.statistics.total_flows, 0);
    assert!(baseline.is_learning(START + 10_001.0));
}

#[test]
fn test_concurrent_evaluate_counts_every_flow() {
    let baseline = Arc::new(in_memory());
    let mut handles = Vec::new();

    for t in 0..4u8 {
        let b = Arc::clone(&baseline);
        handles.push(std::thread::spawn(move || {
            for _ in 0..250 {
                b.evaluate_at(&endpoints(t, 20, 443), "BenignTraffic", 0.9, 10, START + 1.0);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let profile = baseline.profile();
    assert_eq!(profile.statistics.total_flows, 1000);
    assert_eq!(profile.port_count(443), 1000);
}
