//! Minimal configuration loading for syneplayer.
//!
//! Master and slave read the same file; each only looks at the sections it
//! needs. CLI flags are applied on top by the binary.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins, field by field):
//! 1. `/etc/syneplayer/config.toml` (system)
//! 2. `~/.config/syneplayer/config.toml` (user)
//! 3. `./syneplayer.toml` (local override, or the `--config` path)
//! 4. Environment variables (`SYNEPLAYER_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [network]
//! master_host = "192.168.1.10"
//! clock_port = 20000
//! rpc_port = 8000
//!
//! [sync]
//! poll_interval_ms = 2000
//! rpc_timeout_ms = 800
//! rpc_retries = 1
//!
//! [media]
//! file = "~/videos/loop.ogg"
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod settings;

pub use loader::{discover_config_files_with_override, expand_path, ConfigSources};
pub use settings::{MediaConfig, NetworkConfig, SyncConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete syneplayer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyneConfig {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl SyneConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with an optional explicit file replacing `./syneplayer.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = SyneConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let overlay = loader::load_overlay(&path)?;
            loader::apply_overlay(&mut config, overlay);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Check cross-field invariants that serde defaults can't express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.clock_port == self.network.rpc_port {
            return Err(ConfigError::Invalid(format!(
                "clock_port and rpc_port must differ (both are {})",
                self.network.rpc_port
            )));
        }
        if self.sync.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be > 0".into()));
        }
        if self.sync.rpc_timeout_ms == 0 {
            return Err(ConfigError::Invalid("rpc_timeout_ms must be > 0".into()));
        }
        Ok(())
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Built by hand so the media file can be commented out when unset
        let mut output = String::new();

        output.push_str("# syneplayer configuration\n\n");

        output.push_str("[network]\n");
        output.push_str(&format!("master_host = \"{}\"\n", self.network.master_host));
        output.push_str(&format!("clock_port = {}\n", self.network.clock_port));
        output.push_str(&format!("rpc_port = {}\n", self.network.rpc_port));

        output.push_str("\n[sync]\n");
        output.push_str(&format!("poll_interval_ms = {}\n", self.sync.poll_interval_ms));
        output.push_str(&format!("rpc_timeout_ms = {}\n", self.sync.rpc_timeout_ms));
        output.push_str(&format!("rpc_retries = {}\n", self.sync.rpc_retries));

        output.push_str("\n[media]\n");
        match &self.media.file {
            Some(file) => output.push_str(&format!("file = \"{}\"\n", file.display())),
            None => output.push_str("# file = \"/path/to/video\"\n"),
        }

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output
    }
}
