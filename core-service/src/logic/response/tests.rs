use super::*;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;

use crate::logic::alerts::{Alert, Detection};
use crate::logic::config::ResponseConfig;
use crate::logic::model::Severity;

struct RejectingFirewall;

impl Firewall for RejectingFirewall {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn block(&self, _ip: IpAddr, _reason: &str, _permanent: bool) -> Result<(), ActionError> {
        Err(ActionError::AccessDenied {
            reason: "not root".to_string(),
        })
    }

    fn unblock(&self, _ip: IpAddr) -> Result<(), ActionError> {
        Err(ActionError::AccessDenied {
            reason: "not root".to_string(),
        })
    }
}

fn alert(severity: Severity, src: &str) -> Alert {
    Alert::from_detection(
        1,
        Utc::now(),
        Detection {
            threat: "DDoS-SYN_Flood".to_string(),
            severity,
            src_ip: src.to_string(),
            dst_ip: "10.0.0.1".to_string(),
            dst_port: Some(80),
            context: String::new(),
            confidence: 0.9,
            method: "unanimous".to_string(),
        },
    )
}

fn manager(config: ResponseConfig) -> (ResponseActionManager, Arc<DryRunFirewall>) {
    let fw = Arc::new(DryRunFirewall::new());
    (ResponseActionManager::new(config, fw.clone()), fw)
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

#[test]
fn test_high_severity_blocks() {
    let (mgr, fw) = manager(ResponseConfig::default());
    let resp = mgr.handle_threat(&alert(Severity::High, "203.0.113.7"));

    assert!(resp.success);
    assert_eq!(resp.actions_taken.len(), 1);
    assert_eq!(resp.actions_taken[0].action.action_type(), "block_ip");
    assert_eq!(resp.actions_taken[0].action.target(), ip("203.0.113.7"));
    assert!(mgr.is_blocked(&ip("203.0.113.7")));
    assert_eq!(fw.rules(), vec![ip("203.0.113.7")]);
}

#[test]
fn test_medium_severity_needs_opt_in() {
    let (mgr, _) = manager(ResponseConfig::default());
    let resp = mgr.handle_threat(&alert(Severity::Medium, "203.0.113.7"));
    assert!(resp.actions_taken.is_empty());
    assert!(!resp.success);
    assert!(mgr.blocked().is_empty());

    let (mgr, _) = manager(ResponseConfig {
        auto_block_medium: true,
        ..ResponseConfig::default()
    });
    assert!(mgr.handle_threat(&alert(Severity::Medium, "203.0.113.7")).success);
    assert_eq!(mgr.blocked().len(), 1);
}

#[test]
fn test_low_severity_monitors() {
    let (mgr, fw) = manager(ResponseConfig::default());
    let resp = mgr.handle_threat(&alert(Severity::Low, "203.0.113.7"));
    assert!(resp.success);
    assert_eq!(resp.actions_taken[0].action.action_type(), "monitor");
    assert!(fw.rules().is_empty());
}

#[test]
fn test_unparseable_source_is_ignored() {
    let (mgr, _) = manager(ResponseConfig::default());
    let resp = mgr.handle_threat(&alert(Severity::High, "unknown"));
    assert!(!resp.success);
    assert!(mgr.history(10).is_empty());
}

#[test]
fn test_whitelist_never_blocked() {
    let (mgr, _) = manager(ResponseConfig {
        whitelist: vec!["192.168.1.1".to_string(), "not-an-ip".to_string()],
        ..ResponseConfig::default()
    });
    assert!(!mgr.block_ip(ip("192.168.1.1"), "test", true));

    mgr.whitelist_ip(ip("10.9.9.9"));
    assert!(!mgr.handle_threat(&alert(Severity::High, "10.9.9.9")).success);
    assert!(mgr.blocked().is_empty());

    assert!(mgr.remove_from_whitelist(&ip("10.9.9.9")));
    assert!(mgr.block_ip(ip("10.9.9.9"), "test", false));
}

#[test]
fn test_already_blocked_short_circuits() {
    let (mgr, _) = manager(ResponseConfig::default());
    assert!(mgr.block_ip(ip("10.0.0.66"), "first", false));
    assert!(mgr.block_ip(ip("10.0.0.66"), "second", false));
    assert_eq!(mgr.blocked().len(), 1);
    assert_eq!(mgr.blocked()[0].reason, "first");
    assert_eq!(mgr.history(10).len(), 1);
}

#[test]
fn test_failure_recorded_not_escalated() {
    let mgr = ResponseActionManager::new(ResponseConfig::default(), Arc::new(RejectingFirewall));
    let resp = mgr.handle_threat(&alert(Severity::High, "203.0.113.7"));

    assert!(!resp.success);
    assert!(!mgr.is_blocked(&ip("203.0.113.7")));
    let history = mgr.history(10);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ActionStatus::Failed);
    assert!(history[0].message.contains("not root"));
}

#[test]
fn test_disabled_does_nothing() {
    let (mgr, fw) = manager(ResponseConfig {
        enabled: false,
        ..ResponseConfig::default()
    });
    assert!(!mgr.block_ip(ip("10.0.0.1"), "test", false));
    assert!(fw.rules().is_empty());
}

#[test]
fn test_expired_blocks_lifted() {
    let (mgr, fw) = manager(ResponseConfig {
        temp_block_secs: 100,
        ..ResponseConfig::default()
    });
    mgr.block_ip_at(ip("10.0.0.1"), "temp", false, 1_000);
    mgr.block_ip_at(ip("10.0.0.2"), "temp", false, 1_050);
    mgr.block_ip_at(ip("10.0.0.3"), "perm", true, 0);

    assert!(mgr.check_and_unblock_expired(1_099).is_empty());
    assert_eq!(mgr.check_and_unblock_expired(1_100), vec![ip("10.0.0.1")]);

    let remaining: Vec<IpAddr> = mgr.blocked().iter().map(|b| b.ip).collect();
    assert_eq!(remaining, vec![ip("10.0.0.3"), ip("10.0.0.2")]);
    assert_eq!(fw.rules(), vec![ip("10.0.0.2"), ip("10.0.0.3")]);

    let last = mgr.history(1);
    assert_eq!(last[0].action, ResponseAction::UnblockIp { ip: ip("10.0.0.1") });
    assert_eq!(last[0].reason, "block_expired");
}

#[test]
fn test_manual_unblock() {
    let (mgr, _) = manager(ResponseConfig::default());
    assert!(!mgr.unblock_ip(ip("10.0.0.1")));
    mgr.block_ip(ip("10.0.0.1"), "test", true);
    assert!(mgr.unblock_ip(ip("10.0.0.1")));
    assert!(mgr.blocked().is_empty());
}
