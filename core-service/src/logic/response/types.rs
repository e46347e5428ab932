//! Response Types

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// RESPONSE ACTION TYPES
// ============================================================================

/// Response action taken against a source address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseAction {
    /// Drop traffic from an address
    BlockIp { ip: IpAddr, permanent: bool },

    /// Lift a block
    UnblockIp { ip: IpAddr },

    /// No automated action, keep watching
    Monitor { ip: IpAddr },
}

impl ResponseAction {
    pub fn action_type(&self) -> &'static str {
        match self {
            ResponseAction::BlockIp { .. } => "block_ip",
            ResponseAction::UnblockIp { .. } => "unblock_ip",
            ResponseAction::Monitor { .. } => "monitor",
        }
    }

    pub fn target(&self) -> IpAddr {
        match self {
            ResponseAction::BlockIp { ip, .. } | ResponseAction::UnblockIp { ip } | ResponseAction::Monitor { ip } => *ip,
        }
    }

    pub fn description(&self) -> String {
        match self {
            ResponseAction::BlockIp { ip, permanent: true } => format!("Block {} permanently", ip),
            ResponseAction::BlockIp { ip, permanent: false } => format!("Block {} temporarily", ip),
            ResponseAction::UnblockIp { ip } => format!("Unblock {}", ip),
            ResponseAction::Monitor { ip } => format!("Monitor {}", ip),
        }
    }
}

/// Status of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Success => "success",
            ActionStatus::Failed => "failed",
        }
    }
}

/// One entry of the action history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: ResponseAction,
    pub status: ActionStatus,
    pub reason: String,
    pub message: String,
    /// Unix seconds
    pub timestamp: i64,
}

impl ActionResult {
    pub fn success(&self) -> bool {
        self.status == ActionStatus::Success
    }
}

/// Firewall collaborator error
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    #[error("Command failed: {command} (exit {exit_code}): {stderr}")]
    CommandFailed { command: String, exit_code: i32, stderr: String },
    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },
    #[error("{message}")]
    Other { message: String },
}

/// An active block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub ip: IpAddr,
    pub reason: String,
    pub permanent: bool,
    /// Unix seconds
    pub blocked_at: i64,
}

/// What `handle_threat` did for one alert
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreatResponse {
    pub actions_taken: Vec<ActionResult>,
    pub success: bool,
}
