//! Feature Vector - Core data structure for scorer input
//!
//! **Ordered, named, immutable feature vector with layout metadata**
//!
//! Every vector carries the name table it was built against so it can be
//! checked column-by-column against what a scorer expects.

use serde::Serialize;
use thiserror::Error;

use super::layout::FeatureSchema;

// ============================================================================
// FEATURE VECTOR
// ============================================================================

/// Versioned Feature Vector with layout metadata
///
/// Produced once per flow snapshot and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    /// Feature layout version
    pub version: u8,
    /// CRC32 hash of the feature layout (for mismatch detection)
    pub layout_hash: u32,
    names: &'static [&'static str],
    values: Vec<f64>,
}

impl FeatureVector {
    /// Build from values laid out in `schema` order
    ///
    /// Returns `None` if the value count does not match the schema.
    pub fn from_schema(schema: FeatureSchema, values: Vec<f64>) -> Option<Self> {
        if values.len() != schema.feature_count() {
            return None;
        }
        Some(Self {
            version: schema.version(),
            layout_hash: schema.layout_hash(),
            names: schema.names(),
            values,
        })
    }

    /// The result for a flow with no packets
    pub fn empty() -> Self {
        Self {
            version: 0,
            layout_hash: 0,
            names: &[],
            values: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn names(&self) -> &'static [&'static str] {
        self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get feature by name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|&n| n == name)
            .and_then(|i| self.values.get(i).copied())
    }

    /// Values narrowed to f32 for model input
    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|&v| v as f32).collect()
    }

    /// Named view for logging
    pub fn to_log_entry(&self) -> serde_json::Value {
        serde_json::json!({
            "feature_version": self.version,
            "layout_hash": self.layout_hash,
            "named_values": self.names.iter()
                .zip(self.values.iter())
                .map(|(name, value)| (name.to_string(), *value))
                .collect::<std::collections::BTreeMap<_, _>>(),
        })
    }
}

// ============================================================================
// CONTRACT VALIDATION
// ============================================================================

/// Vector columns differ from what a consumer expects
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("feature contract mismatch: missing {missing:?}, extra {extra:?}, order_mismatch {order_mismatch}")]
pub struct FeatureContractError {
    /// Expected names the vector lacks
    pub missing: Vec<String>,
    /// Vector names the consumer does not expect
    pub extra: Vec<String>,
    /// Same columns, different order (or duplicated columns)
    pub order_mismatch: bool,
}

/// Check that `vector` has exactly `expected` columns in exactly that order
pub fn validate<S: AsRef<str>>(vector: &FeatureVector, expected: &[S]) -> Result<(), FeatureContractError> {
    check_names(vector.names(), expected)
}

/// Same check over a bare name list (used when wiring scorers at start-up)
pub fn check_names<A: AsRef<str>, S: AsRef<str>>(actual: &[A], expected: &[S]) -> Result<(), FeatureContractError> {
    let exact = actual.len() == expected.len()
        && actual.iter().zip(expected).all(|(a, e)| a.as_ref() == e.as_ref());
    if exact {
        return Ok(());
    }

    let missing: Vec<String> = expected
        .iter()
        .filter(|e| !actual.iter().any(|a| a.as_ref() == e.as_ref()))
        .map(|e| e.as_ref().to_string())
        .collect();
    let extra: Vec<String> = actual
        .iter()
        .filter(|a| !expected.iter().any(|e| e.as_ref() == a.as_ref()))
        .map(|a| a.as_ref().to_string())
        .collect();
    let order_mismatch = missing.is_empty() && extra.is_empty();

    Err(FeatureContractError { missing, extra, order_mismatch })
}

// ============================================================================
// TESTS
// ============================================================================
