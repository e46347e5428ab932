//! Scorer seam - one classification service per ensemble member
//!
//! The ensemble treats scorers as opaque `score(input) -> (label, confidence)`
//! services that also publish the exact feature order they expect.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::preprocess::StandardScaler;
use super::severity::Severity;

// ============================================================================
// TYPES
// ============================================================================

/// Static description of what a scorer consumes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerMetadata {
    /// Exact ordered feature names
    pub feature_names: Vec<String>,
    /// Applied by the ensemble before `score`
    #[serde(default)]
    pub preprocessing: Option<StandardScaler>,
}

/// Raw scorer verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutput {
    pub label: String,
    pub confidence: f64,
}

impl ScoreOutput {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self { label: label.into(), confidence }
    }
}

/// One scorer's contribution after severity mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub severity: Severity,
    /// In [0, 1]
    pub confidence: f64,
}

#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("model not loaded: {0}")]
    NotLoaded(String),
    #[error("artifact error: {0}")]
    Artifact(String),
    #[error("integrity check failed for {path}: expected {expected}, got {actual}")]
    Integrity { path: String, expected: String, actual: String },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("bad input: {0}")]
    Input(String),
}

// ============================================================================
// TRAIT
// ============================================================================

/// A classification service taking part in the ensemble
pub trait Scorer: Send + Sync {
    /// Stable id, used for weights and fusion method naming
    fn id(&self) -> &str;

    fn metadata(&self) -> &ScorerMetadata;

    /// Score preprocessed input laid out in `metadata().feature_names` order
    fn score(&self, input: &[f32]) -> Result<ScoreOutput, ScorerError>;

    /// Drop any cached artifacts
    fn release(&self) {}
}
