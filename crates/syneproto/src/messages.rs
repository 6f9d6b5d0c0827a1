//! Request and reply bodies carried in SYNE01 frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Epoch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochRequest {
    /// The epoch of the running master session.
    GetEpoch,
    /// Operator-facing summary of the master.
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochReply {
    Epoch { epoch: Epoch },
    Status(MasterStatus),
    Error { message: String },
}

/// What `syneplayer status` prints about a master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterStatus {
    pub epoch: Epoch,
    /// Port the network clock provider listens on.
    pub clock_port: u16,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub version: String,
}
