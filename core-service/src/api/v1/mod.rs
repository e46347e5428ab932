//! Version 1 query API
//!
//! Frozen alias of the current commands; a breaking change goes to `v2`.

pub use super::commands::*;
pub use super::engine_status::{BaselineStatus, EngineStatus, ModelStatus, ScorerStatus};
