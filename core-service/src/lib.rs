//! FlowGuard core: real-time network intrusion detection
//!
//! - `logic`: the detection pipeline and its stores
//! - `api`: query surface over a running engine
//! - `constants`: defaults and environment overrides

pub mod api;
pub mod constants;
pub mod logic;
