//! API Module
//!
//! Query surface for front ends, versioned so clients can pin a shape.
//!
//! Structure:
//! - commands.rs: current stable commands over `&DetectionEngine`
//! - engine_status.rs: aggregated `EngineStatus` snapshot
//! - v1/mod.rs: re-exports commands as the v1 API
//!
//! Usage:
//! - `api::commands::get_alerts(&engine, None, None)` - direct access
//! - `api::v1::get_alerts(&engine, None, None)` - version 1 API

pub mod commands;
pub mod engine_status;
pub mod v1;

pub use commands::*;
pub use engine_status::EngineStatus;
