//! Severity tiers and the fixed label → severity mapping

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::BENIGN_LABEL;

/// Coarse risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    pub fn all() -> [Severity; 3] {
        [Severity::Low, Severity::Medium, Severity::High]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

const VOLUMETRIC: &[&str] = &["DDoS", "DoS", "Flood"];
const COMPROMISE: &[&str] = &["Backdoor", "Malware", "Injection", "Mirai"];
const RECON: &[&str] = &["Recon", "Scan", "Discovery"];

pub fn is_benign(label: &str) -> bool {
    label == BENIGN_LABEL
}

/// Severity of a final label; unmatched labels map to High
pub fn severity_for(label: &str) -> Severity {
    let contains_any = |needles: &[&str]| needles.iter().any(|n| label.contains(n));

    if is_benign(label) {
        Severity::Low
    } else if contains_any(VOLUMETRIC) {
        Severity::Medium
    } else if contains_any(COMPROMISE) {
        Severity::High
    } else if contains_any(RECON) {
        Severity::Medium
    } else {
        Severity::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping() {
        assert_eq!(severity_for("BenignTraffic"), Severity::Low);
        assert_eq!(severity_for("DDoS-SYN_Flood"), Severity::Medium);
        assert_eq!(severity_for("DoS-UDP_Flood"), Severity::Medium);
        assert_eq!(severity_for("Backdoor_Malware"), Severity::High);
        assert_eq!(severity_for("SqlInjection"), Severity::High);
        assert_eq!(severity_for("Mirai-greeth_flood"), Severity::High);
        assert_eq!(severity_for("Recon-PortScan"), Severity::Medium);
        assert_eq!(severity_for("VulnerabilityScan"), Severity::Medium);
        assert_eq!(severity_for("DictionaryBruteForce"), Severity::High);
        assert_eq!(severity_for("benigntraffic"), Severity::High);
    }

    #[test]
    fn test_ordering_and_parse() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert_eq!("HIGH".parse::<Severity>(), Ok(Severity::High));
        assert!("critical".parse::<Severity>().is_err());
    }
}
