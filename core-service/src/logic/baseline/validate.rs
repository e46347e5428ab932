use thiserror::Error;

use super::types::{BaselineProfile, BASELINE_FORMAT_VERSION};

#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization Error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Baseline format mismatch: expected v{expected}, got v{actual}")]
    VersionMismatch { expected: u32, actual: u32 },
    #[error("Baseline Error: {0}")]
    Other(String),
}

/// Validate a loaded profile against what this engine understands
pub fn validate_baseline(profile: &BaselineProfile) -> Result<(), BaselineError> {
    if profile.version != BASELINE_FORMAT_VERSION {
        return Err(BaselineError::VersionMismatch {
            expected: BASELINE_FORMAT_VERSION,
            actual: profile.version,
        });
    }
    if !profile.start_time.is_finite() || !profile.learning_period.is_finite() || profile.learning_period < 0.0 {
        return Err(BaselineError::Other(format!(
            "invalid timing (start {}, period {})",
            profile.start_time, profile.learning_period
        )));
    }
    Ok(())
}
