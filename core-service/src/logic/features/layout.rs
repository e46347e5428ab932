//! Feature Layout - Centralized Feature Definition
//!
//! **CRITICAL: This file controls the feature schemas**
//!
//! Two scorer generations are supported:
//! - `Ciciot37`: 37 flow features (current models)
//! - `Ciciot46`: the full 46-column CICIoT2023 layout
//!
//! ## Rules (NEVER break these):
//! 1. Add feature → increment the schema version
//! 2. Change order → increment the schema version
//! 3. Remove feature → increment the schema version

use std::fmt;
use std::str::FromStr;

use crc32fast::Hasher;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEATURE LAYOUTS (Authoritative source)
// ============================================================================

/// 37-column layout, exact order the current scorers were trained on
pub const CICIOT37_LAYOUT: &[&str] = &[
    "flow_duration", "Header_Length", "Protocol Type", "Duration",
    "Rate", "Drate",
    "fin_flag_number", "syn_flag_number", "psh_flag_number",
    "ack_flag_number", "ece_flag_number", "cwr_flag_number",
    "syn_count", "fin_count", "urg_count", "rst_count",
    "HTTP", "HTTPS", "DNS", "Telnet", "SMTP", "SSH", "IRC",
    "TCP", "UDP", "DHCP", "ARP", "ICMP", "IPv",
    "Tot sum", "Min", "Max", "AVG", "Tot size", "IAT",
    "Covariance", "Variance",
];

/// 46-column CICIoT2023 layout ("Magnitue" is the dataset's spelling)
pub const CICIOT46_LAYOUT: &[&str] = &[
    "flow_duration", "Header_Length", "Protocol Type", "Duration",
    "Rate", "Srate", "Drate",
    "fin_flag_number", "syn_flag_number", "rst_flag_number",
    "psh_flag_number", "ack_flag_number", "ece_flag_number", "cwr_flag_number",
    "ack_count", "syn_count", "fin_count", "urg_count", "rst_count",
    "HTTP", "HTTPS", "DNS", "Telnet", "SMTP", "SSH", "IRC",
    "TCP", "UDP", "DHCP", "ARP", "ICMP", "IPv", "LLC",
    "Tot sum", "Min", "Max", "AVG", "Std", "Tot size", "IAT",
    "Number", "Magnitue", "Radius", "Covariance", "Variance", "Weight",
];

pub const CICIOT37_VERSION: u8 = 1;
pub const CICIOT46_VERSION: u8 = 1;

static CICIOT37_HASH: Lazy<u32> = Lazy::new(|| compute_layout_hash(CICIOT37_VERSION, CICIOT37_LAYOUT));
static CICIOT46_HASH: Lazy<u32> = Lazy::new(|| compute_layout_hash(CICIOT46_VERSION, CICIOT46_LAYOUT));

// ============================================================================
// SCHEMA
// ============================================================================

/// Which feature layout the engine produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSchema {
    #[default]
    Ciciot37,
    Ciciot46,
}

impl FeatureSchema {
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            FeatureSchema::Ciciot37 => CICIOT37_LAYOUT,
            FeatureSchema::Ciciot46 => CICIOT46_LAYOUT,
        }
    }

    pub fn version(&self) -> u8 {
        match self {
            FeatureSchema::Ciciot37 => CICIOT37_VERSION,
            FeatureSchema::Ciciot46 => CICIOT46_VERSION,
        }
    }

    pub fn feature_count(&self) -> usize {
        self.names().len()
    }

    /// CRC32 of version + names (cached)
    pub fn layout_hash(&self) -> u32 {
        match self {
            FeatureSchema::Ciciot37 => *CICIOT37_HASH,
            FeatureSchema::Ciciot46 => *CICIOT46_HASH,
        }
    }

    /// Get feature index by name (O(n) but features are few)
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names().iter().position(|&n| n == name)
    }

    /// Find the schema whose names match exactly, if any
    pub fn matching(names: &[String]) -> Option<FeatureSchema> {
        [FeatureSchema::Ciciot37, FeatureSchema::Ciciot46]
            .into_iter()
            .find(|schema| {
                let layout = schema.names();
                layout.len() == names.len() && layout.iter().zip(names).all(|(a, b)| *a == b)
            })
    }
}

impl fmt::Display for FeatureSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureSchema::Ciciot37 => write!(f, "ciciot37"),
            FeatureSchema::Ciciot46 => write!(f, "ciciot46"),
        }
    }
}

impl FromStr for FeatureSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ciciot37" | "37" => Ok(FeatureSchema::Ciciot37),
            "ciciot46" | "46" => Ok(FeatureSchema::Ciciot46),
            other => Err(format!("unknown feature schema '{}'", other)),
        }
    }
}

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// Compute CRC32 hash of a feature layout
/// Used to detect layout mismatches at runtime
pub fn compute_layout_hash(version: u8, names: &[&str]) -> u32 {
    let mut hasher = Hasher::new();

    // Include version in hash
    hasher.update(&[version]);

    for name in names {
        hasher.update(name.as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

/// Complete layout information for serialization/logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub schema: FeatureSchema,
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

impl LayoutInfo {
    pub fn of(schema: FeatureSchema) -> Self {
        Self {
            schema,
            version: schema.version(),
            hash: schema.layout_hash(),
            feature_count: schema.feature_count(),
            feature_names: schema.names().iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for LayoutInfo {
    fn default() -> Self {
        Self::of(FeatureSchema::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_counts() {
        assert_eq!(FeatureSchema::Ciciot37.feature_count(), 37);
        assert_eq!(FeatureSchema::Ciciot46.feature_count(), 46);
    }

    #[test]
    fn test_layout_hash_consistency() {
        let hash1 = compute_layout_hash(CICIOT37_VERSION, CICIOT37_LAYOUT);
        let hash2 = FeatureSchema::Ciciot37.layout_hash();
        assert_eq!(hash1, hash2);
        assert_ne!(hash1, 0);
    }

    #[test]
    fn test_schemas_hash_differently() {
        assert_ne!(
            FeatureSchema::Ciciot37.layout_hash(),
            FeatureSchema::Ciciot46.layout_hash()
        );
    }

    #[test]
    fn test_no_duplicate_names() {
        for schema in [FeatureSchema::Ciciot37, FeatureSchema::Ciciot46] {
            let names = schema.names();
            let unique: std::collections::HashSet<_> = names.iter().collect();
            assert_eq!(unique.len(), names.len(), "{} has duplicates", schema);
        }
    }

    #[test]
    fn test_index_of() {
        let s = FeatureSchema::Ciciot37;
        assert_eq!(s.index_of("flow_duration"), Some(0));
        assert_eq!(s.index_of("Variance"), Some(36));
        assert_eq!(s.index_of("Srate"), None);
        assert_eq!(FeatureSchema::Ciciot46.index_of("Weight"), Some(45));
    }

    #[test]
    fn test_matching_and_parse() {
        let names: Vec<String> = CICIOT46_LAYOUT.iter().map(|s| s.to_string()).collect();
        assert_eq!(FeatureSchema::matching(&names), Some(FeatureSchema::Ciciot46));
        assert_eq!(FeatureSchema::matching(&names[1..]), None);

        assert_eq!("CICIOT46".parse::<FeatureSchema>(), Ok(FeatureSchema::Ciciot46));
        assert!("ciciot99".parse::<FeatureSchema>().is_err());
    }

    #[test]
    fn test_layout_info() {
        let info = LayoutInfo::of(FeatureSchema::Ciciot46);
        assert_eq!(info.feature_count, 46);
        assert_eq!(info.feature_names.len(), 46);
        assert_eq!(info.hash, FeatureSchema::Ciciot46.layout_hash());
    }
}
