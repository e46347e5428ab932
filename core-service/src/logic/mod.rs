//! Logic Module - Business Logic & Engines
//!
//! Pipeline stages, leaves first:
//! - `packet` - packet records and flow keys
//! - `features/` - deterministic flow → vector reduction
//! - `flow/` - flow table and snapshot scheduling
//! - `model/` - scorers and ensemble fusion
//! - `baseline/` - adaptive false-positive suppression
//! - `alerts/` - durable alert store
//! - `statistics`, `response/` - downstream of accepted alerts
//! - `engine/` - the owning handle, `maintenance` - its housekeeping thread
//! - `capture` - packet sources

pub mod config;
pub mod packet;
pub mod features;
pub mod flow;
pub mod model;
pub mod baseline;
pub mod alerts;
pub mod statistics;
pub mod response;
pub mod capture;
pub mod engine;
pub mod maintenance;

/// Wall clock as unix seconds
pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Move an unreadable store out of the way so a fresh one never overwrites it
///
/// Returns the new location, `<name>.corrupt-<utc timestamp>`.
pub fn set_aside_corrupt(path: &std::path::Path) -> std::io::Result<std::path::PathBuf> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f");
    let target = path.with_file_name(format!("{}.corrupt-{}", name, stamp));
    std::fs::rename(path, &target)?;
    Ok(target)
}
