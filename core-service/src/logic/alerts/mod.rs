//! Alerts Module - Durable Review Queue
//!
//! Accepted detections become numbered alerts that analysts acknowledge
//! and move through `new -> investigating -> resolved | false_positive`.
//! The full store is rewritten on every mutation.

pub mod types;
pub mod storage;
pub mod manager;
#[cfg(test)]
mod tests;

pub use types::{Alert, AlertCounts, AlertError, AlertFilter, AlertStatus, AlertStore, Detection};
pub use manager::AlertManager;
