//! Config sections. Every field has a serde default so partial files parse.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where the master lives and which ports the two control channels use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address slaves use to reach the master.
    /// Default: 127.0.0.1
    #[serde(default = "NetworkConfig::default_master_host")]
    pub master_host: String,

    /// Port of the network clock primitive (provider on the master).
    /// Default: 20000
    #[serde(default = "NetworkConfig::default_clock_port")]
    pub clock_port: u16,

    /// Port of the epoch RPC service.
    /// Default: 8000
    #[serde(default = "NetworkConfig::default_rpc_port")]
    pub rpc_port: u16,
}

impl NetworkConfig {
    fn default_master_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_clock_port() -> u16 {
        20000
    }

    fn default_rpc_port() -> u16 {
        8000
    }

    /// ZMQ endpoint the master binds (all interfaces).
    pub fn rpc_bind_endpoint(&self) -> String {
        format!("tcp://0.0.0.0:{}", self.rpc_port)
    }

    /// ZMQ endpoint a slave connects to.
    pub fn rpc_connect_endpoint(&self) -> String {
        format!("tcp://{}:{}", self.master_host, self.rpc_port)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            master_host: Self::default_master_host(),
            clock_port: Self::default_clock_port(),
            rpc_port: Self::default_rpc_port(),
        }
    }
}

/// Slave polling behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Interval between epoch polls.
    /// Default: 2000
    #[serde(default = "SyncConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Timeout for a single RPC attempt.
    /// Default: 800
    #[serde(default = "SyncConfig::default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,

    /// Retries per poll after the first attempt fails.
    /// Default: 1
    #[serde(default = "SyncConfig::default_rpc_retries")]
    pub rpc_retries: u32,
}

impl SyncConfig {
    fn default_poll_interval_ms() -> u64 {
        2000
    }

    fn default_rpc_timeout_ms() -> u64 {
        800
    }

    fn default_rpc_retries() -> u32 {
        1
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            rpc_timeout_ms: Self::default_rpc_timeout_ms(),
            rpc_retries: Self::default_rpc_retries(),
        }
    }
}

/// Media handed to the playback engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConfig {
    /// File played in a loop on every node.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// EnvFilter directive (trace, debug, info, warn, error, or a full filter).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
