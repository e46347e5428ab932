//! Response & Notification Module
//!
//! Downstream collaborators of accepted alerts. Everything here is
//! fire-and-forget: failures land in the action history and the log,
//! never back in the detection path.
//!
//! # Components
//! - `actions.rs`: severity → block policy, block table, history, expiry
//! - `network.rs`: `Firewall` trait, dry-run and iptables backends
//! - `notify.rs`: `Notifier` trait, log backend

pub mod actions;
pub mod network;
pub mod notify;
pub mod types;
#[cfg(test)]
mod tests;

pub use types::{ActionError, ActionResult, ActionStatus, BlockEntry, ResponseAction, ThreatResponse};
pub use actions::ResponseActionManager;
pub use network::{DryRunFirewall, Firewall, IptablesFirewall};
pub use notify::{should_notify, AlertPayload, LogNotifier, Notifier};
