//! Network Isolation - firewall collaborators
//!
//! `DryRunFirewall` only records rules; `IptablesFirewall` shells out to
//! `iptables` and needs root.

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::process::Command;

use parking_lot::Mutex;

use super::types::ActionError;

// ============================================================================
// COLLABORATOR
// ============================================================================

/// Address-level block/unblock backend
pub trait Firewall: Send + Sync {
    fn name(&self) -> &str;

    fn block(&self, ip: IpAddr, reason: &str, permanent: bool) -> Result<(), ActionError>;

    fn unblock(&self, ip: IpAddr) -> Result<(), ActionError>;
}

// ============================================================================
// DRY RUN
// ============================================================================

#[derive(Default)]
pub struct DryRunFirewall {
    rules: Mutex<BTreeSet<IpAddr>>,
}

impl DryRunFirewall {
    pub fn new() -> Self {
        Self::default()
    }

    /// Addresses a real backend would currently drop
    pub fn rules(&self) -> Vec<IpAddr> {
        self.rules.lock().iter().copied().collect()
    }
}

impl Firewall for DryRunFirewall {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn block(&self, ip: IpAddr, reason: &str, permanent: bool) -> Result<(), ActionError> {
        log::info!("[dry-run] would block {} ({}, permanent={})", ip, reason, permanent);
        self.rules.lock().insert(ip);
        Ok(())
    }

    fn unblock(&self, ip: IpAddr) -> Result<(), ActionError> {
        log::info!("[dry-run] would unblock {}", ip);
        self.rules.lock().remove(&ip);
        Ok(())
    }
}

// ============================================================================
// IPTABLES
// ============================================================================

const IPTABLES: &str = "iptables";
const IP6TABLES: &str = "ip6tables";
const CHAIN: &str = "INPUT";

pub struct IptablesFirewall;

impl IptablesFirewall {
    fn binary(ip: &IpAddr) -> &'static str {
        if ip.is_ipv6() {
            IP6TABLES
        } else {
            IPTABLES
        }
    }

    /// `-A|-D INPUT -s <ip> -j DROP`
    pub fn rule_args(ip: &IpAddr, add: bool) -> Vec<String> {
        vec![
            if add { "-A" } else { "-D" }.to_string(),
            CHAIN.to_string(),
            "-s".to_string(),
            ip.to_string(),
            "-j".to_string(),
            "DROP".to_string(),
        ]
    }

    fn run(ip: &IpAddr, add: bool) -> Result<(), ActionError> {
        let bin = Self::binary(ip);
        let args = Self::rule_args(ip, add);

        let output = Command::new(bin).args(&args).output().map_err(|e| ActionError::Other {
            message: format!("Failed to run {}: {}", bin, e),
        })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ActionError::CommandFailed {
                command: format!("{} {}", bin, args.join(" ")),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl Firewall for IptablesFirewall {
    fn name(&self) -> &str {
        IPTABLES
    }

    fn block(&self, ip: IpAddr, reason: &str, _permanent: bool) -> Result<(), ActionError> {
        log::debug!("iptables block {} ({})", ip, reason);
        Self::run(&ip, true)
    }

    fn unblock(&self, ip: IpAddr) -> Result<(), ActionError> {
        Self::run(&ip, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_args() {
        let ip: IpAddr = "10.1.2.3".parse().unwrap();
        assert_eq!(
            IptablesFirewall::rule_args(&ip, true),
            vec!["-A", "INPUT", "-s", "10.1.2.3", "-j", "DROP"]
        );
        assert_eq!(IptablesFirewall::rule_args(&ip, false)[0], "-D");
        assert_eq!(IptablesFirewall::binary(&"::1".parse().unwrap()), "ip6tables");
    }

    #[test]
    fn test_dry_run_tracks_rules() {
        let fw = DryRunFirewall::new();
        let ip: IpAddr = "10.1.2.3".parse().unwrap();
        fw.block(ip, "test", false).unwrap();
        assert_eq!(fw.rules(), vec![ip]);
        fw.unblock(ip).unwrap();
        assert!(fw.rules().is_empty());
    }
}
