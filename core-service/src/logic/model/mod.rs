//! Model Module - Scoring & Ensemble Fusion
//!
//! Scorers stay behind the `Scorer` trait so models can be swapped,
//! combined, or mocked without touching the pipeline.

pub mod scorer;
pub mod severity;
pub mod preprocess;
pub mod cache;
pub mod inference;
pub mod rules;
pub mod ensemble;
pub mod instrumentation;


// Re-export common types
pub use scorer::{Prediction, ScoreOutput, Scorer, ScorerError, ScorerMetadata};
pub use severity::{is_benign, severity_for, Severity};
pub use preprocess::StandardScaler;
pub use cache::ArtifactCache;
pub use inference::{OnnxScorer, SessionCache};
pub use rules::RuleScorer;
pub use ensemble::{EnsembleEngine, EnsembleError, EnsembleResult, FusionMethod, ScorerVote};
pub use instrumentation::{Instrumentation, LogInstrumentation};
