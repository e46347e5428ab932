use super::*;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tempfile::tempdir;

use crate::logic::config::AlertConfig;
use crate::logic::model::Severity;

fn detection(threat: &str, severity: Severity, src: &str) -> Detection {
    Detection {
        threat: threat.to_string(),
        severity,
        src_ip: src.to_string(),
        dst_ip: "10.0.0.5".to_string(),
        dst_port: Some(80),
        context: "packets=10".to_string(),
        confidence: 0.9,
        method: "unanimous".to_string(),
    }
}

fn in_memory() -> AlertManager {
    AlertManager::open(AlertConfig::default(), None)
}

#[test]
fn test_ids_increase() {
    let mgr = in_memory();
    let a = mgr.add(detection("DDoS-SYN_Flood", Severity::Medium, "1.1.1.1"));
    let b = mgr.add(detection("Recon-PortScan", Severity::Medium, "2.2.2.2"));
    assert_eq!(a, 1);
    assert_eq!(b, 2);

    let alert = mgr.get(a).unwrap();
    assert_eq!(alert.status, AlertStatus::New);
    assert!(!alert.acknowledged);
}

#[test]
fn test_concurrent_add_unique_ids() {
    let mgr = Arc::new(in_memory());
    let mut handles = Vec::new();

    for t in 0..8 {
        let m = Arc::clone(&mgr);
        handles.push(std::thread::spawn(move || {
            (0..50)
                .map(|_| m.add(detection("DDoS-SYN_Flood", Severity::Medium, &format!("10.0.{}.1", t))))
                .collect::<Vec<u64>>()
        }));
    }

    let mut all = Vec::new();
    for h in handles {
        let ids = h.join().unwrap();
        // per-thread ids strictly increase
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        all.extend(ids);
    }

    let unique: HashSet<u64> = all.iter().copied().collect();
    assert_eq!(unique.len(), 400);
    assert_eq!(all.iter().max(), Some(&400));
}

#[test]
fn test_acknowledge() {
    let mgr = in_memory();
    let id = mgr.add(detection("DDoS-SYN_Flood", Severity::Medium, "1.1.1.1"));

    assert!(mgr.acknowledge(id, "analyst", Some("known load test")));
    assert!(!mgr.acknowledge(999, "analyst", None));

    let alert = mgr.get(id).unwrap();
    assert!(alert.acknowledged);
    assert_eq!(alert.acknowledged_by.as_deref(), Some("analyst"));
    assert!(alert.acknowledged_at.is_some());
    assert_eq!(alert.notes.as_deref(), Some("known load test"));
    assert_eq!(mgr.unacknowledged_count(), 0);
}

#[test]
fn test_update_status() {
    let mgr = in_memory();
    let id = mgr.add(detection("DDoS-SYN_Flood", Severity::Medium, "1.1.1.1"));

    mgr.update_status(id, "investigating", Some("looking")).unwrap();
    assert_eq!(mgr.get(id).unwrap().status, AlertStatus::Investigating);

    // empty notes keep the previous ones
    mgr.update_status(id, "false_positive", Some("")).unwrap();
    let alert = mgr.get(id).unwrap();
    assert_eq!(alert.status, AlertStatus::FalsePositive);
    assert_eq!(alert.notes.as_deref(), Some("looking"));

    assert!(matches!(
        mgr.update_status(id, "closed", None),
        Err(AlertError::InvalidStatus(s)) if s == "closed"
    ));
    assert!(matches!(mgr.update_status(42, "resolved", None), Err(AlertError::NotFound(42))));
}

#[test]
fn test_query_filters_and_order() {
    let mgr = in_memory();
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    mgr.add_at(detection("DDoS-SYN_Flood", Severity::Medium, "1.1.1.1"), t0);
    mgr.add_at(detection("Backdoor_Malware", Severity::High, "2.2.2.2"), t0 + Duration::minutes(1));
    mgr.add_at(detection("DDoS-SYN_Flood", Severity::Medium, "2.2.2.2"), t0 + Duration::minutes(2));
    mgr.add_at(detection("Recon-PortScan", Severity::Medium, "3.3.3.3"), t0 + Duration::minutes(3));
    mgr.acknowledge(3, "analyst", None);

    let all = mgr.query(&AlertFilter::default(), 10);
    let ids: Vec<u64> = all.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![4, 3, 2, 1]);

    let medium = AlertFilter {
        severity: Some(Severity::Medium),
        ..AlertFilter::default()
    };
    assert_eq!(mgr.query(&medium, 2).len(), 2);

    let combined = AlertFilter {
        threat: Some("DDoS-SYN_Flood".to_string()),
        src_ip: Some("2.2.2.2".to_string()),
        acknowledged: Some(true),
        ..AlertFilter::default()
    };
    let hits = mgr.query(&combined, 10);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, 3);

    let unacked_new = AlertFilter {
        acknowledged: Some(false),
        status: Some(AlertStatus::New),
        ..AlertFilter::default()
    };
    assert_eq!(mgr.query(&unacked_new, 10).len(), 3);

    assert_eq!(mgr.recent(1)[0].id, 4);
}

#[test]
fn test_aggregates() {
    let mgr = in_memory();
    mgr.add(detection("DDoS-SYN_Flood", Severity::Medium, "1.1.1.1"));
    mgr.add(detection("Backdoor_Malware", Severity::High, "1.1.1.1"));
    mgr.add(detection("Backdoor_Malware", Severity::High, "1.1.1.1"));
    mgr.update_status(2, "resolved", None).unwrap();
    mgr.acknowledge(1, "analyst", None);

    let by_sev = mgr.counts_by_severity();
    assert_eq!(by_sev[&Severity::Low], 0);
    assert_eq!(by_sev[&Severity::Medium], 1);
    assert_eq!(by_sev[&Severity::High], 2);

    let by_status = mgr.counts_by_status();
    assert_eq!(by_status[&AlertStatus::New], 2);
    assert_eq!(by_status[&AlertStatus::Resolved], 1);

    assert_eq!(mgr.unacknowledged_count(), 2);
}

#[test]
fn test_persistence_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("alerts.json");

    {
        let mgr = AlertManager::open(AlertConfig::default(), Some(path.clone()));
        mgr.add(detection("DDoS-SYN_Flood", Severity::Medium, "1.1.1.1"));
        mgr.add(detection("Recon-PortScan", Severity::Medium, "2.2.2.2"));
        mgr.acknowledge(2, "analyst", Some("ok"));
    }

    let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["alert_counter"], 2);
    assert_eq!(raw["acknowledged_alerts"][0], 2);
    assert_eq!(raw["alerts"][0]["status"], "new");

    let mgr = AlertManager::open(AlertConfig::default(), Some(path));
    assert_eq!(mgr.len(), 2);
    assert!(mgr.get(2).unwrap().acknowledged);
    // ids continue after reload
    assert_eq!(mgr.add(detection("DDoS-SYN_Flood", Severity::Medium, "1.1.1.1")), 3);
}

#[test]
fn test_unreadable_store_is_kept_and_ids_continue() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("alerts.json");

    {
        let mgr = AlertManager::open(AlertConfig::default(), Some(path.clone()));
        for src in ["1.1.1.1", "2.2.2.2", "3.3.3.3"] {
            mgr.add(detection("DDoS-SYN_Flood", Severity::Medium, src));
        }
    }

    let full = std::fs::read(&path).unwrap();
    let truncated = &full[..full.len() / 2];
    std::fs::write(&path, truncated).unwrap();

    let mgr = AlertManager::open(AlertConfig::default(), Some(path.clone()));
    assert!(mgr.is_empty());
    let id = mgr.add(detection("Recon-PortScan", Severity::Medium, "4.4.4.4"));
    assert!(id > 3, "id {} reused", id);

    // the unreadable bytes survive beside the fresh store
    let kept: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.file_name().unwrap().to_string_lossy().starts_with("alerts.json.corrupt-"))
        .collect();
    assert_eq!(kept.len(), 1);
    assert_eq!(std::fs::read(&kept[0]).unwrap(), truncated);

    let reopened = AlertManager::open(AlertConfig::default(), Some(path));
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.get(id).unwrap().src_ip, "4.4.4.4");
}

#[test]
fn test_salvage_max_id_from_truncated_json() {
    let text = r#"{"version": 1, "alerts": [{"id": 7, "alert_id": 99}, {"id": 12, "thr"#;
    assert_eq!(storage::salvage_max_id(text), 12);
    assert_eq!(storage::salvage_max_id("garbage"), 0);
}

#[test]
fn test_counts_are_consistent_under_concurrent_adds() {
    let mgr = Arc::new(in_memory());
    let writer = {
        let m = Arc::clone(&mgr);
        std::thread::spawn(move || {
            for i in 0..200 {
                let severity = if i % 2 == 0 { Severity::High } else { Severity::Low };
                m.add(detection("DDoS-SYN_Flood", severity, "1.1.1.1"));
            }
        })
    };

    for _ in 0..200 {
        let c = mgr.counts();
        assert_eq!(c.by_severity.values().sum::<usize>(), c.total);
        assert_eq!(c.by_status.values().sum::<usize>(), c.total);
        assert_eq!(c.unacknowledged, c.total);
    }
    writer.join().unwrap();

    let c = mgr.counts();
    assert_eq!(c.total, 200);
    assert_eq!(c.by_severity[&Severity::High], 100);
    assert_eq!(c.by_severity[&Severity::Medium], 0);
}

#[test]
fn test_prune_older_than() {
    let mgr = in_memory();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

    mgr.add_at(detection("DDoS-SYN_Flood", Severity::Medium, "1.1.1.1"), now - Duration::days(40));
    mgr.add_at(detection("DDoS-SYN_Flood", Severity::Medium, "1.1.1.1"), now - Duration::days(31));
    mgr.add_at(detection("DDoS-SYN_Flood", Severity::Medium, "1.1.1.1"), now - Duration::days(2));
    mgr.acknowledge(1, "analyst", None);

    assert_eq!(mgr.prune_expired(now), 2);
    assert_eq!(mgr.len(), 1);
    assert!(mgr.get(1).is_none());
    assert_eq!(mgr.prune_older_than(30, now), 0);

    // pruning never frees ids
    assert_eq!(mgr.add(detection("DDoS-SYN_Flood", Severity::Medium, "1.1.1.1")), 4);
}

#[test]
fn test_confidence_normalized() {
    let mgr = in_memory();
    let mut d = detection("DDoS-SYN_Flood", Severity::Medium, "1.1.1.1");
    d.confidence = f64::NAN;
    let id = mgr.add(d);
    assert_eq!(mgr.get(id).unwrap().confidence, 0.0);
}
