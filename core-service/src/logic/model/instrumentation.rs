//! Fusion instrumentation hooks, injected at engine construction

use crate::logic::features::FeatureVector;
use super::ensemble::EnsembleResult;

/// Called explicitly around every fusion
pub trait Instrumentation: Send + Sync {
    fn before_fusion(&self, _features: &FeatureVector, _scorers: &[&str]) {}

    fn after_fusion(&self, _result: &EnsembleResult) {}
}

/// Default hooks: debug-level log lines
#[derive(Debug, Default)]
pub struct LogInstrumentation;

impl Instrumentation for LogInstrumentation {
    fn before_fusion(&self, features: &FeatureVector, scorers: &[&str]) {
        log::debug!(
            "Fusing {} scorers over {} features (layout {:08x})",
            scorers.len(),
            features.len(),
            features.layout_hash
        );
    }

    fn after_fusion(&self, result: &EnsembleResult) {
        log::debug!(
            "Ensemble verdict: {} ({}) conf={:.3} via {}",
            result.label,
            result.severity,
            result.confidence,
            result.method
        );
    }
}
