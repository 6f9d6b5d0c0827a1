//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, SyneConfig};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// A config file as written: only the fields it mentions are `Some`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConfigOverlay {
    #[serde(default)]
    network: NetworkOverlay,
    #[serde(default)]
    sync: SyncOverlay,
    #[serde(default)]
    media: MediaOverlay,
    #[serde(default)]
    telemetry: TelemetryOverlay,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkOverlay {
    master_host: Option<String>,
    clock_port: Option<u16>,
    rpc_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct SyncOverlay {
    poll_interval_ms: Option<u64>,
    rpc_timeout_ms: Option<u64>,
    rpc_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct MediaOverlay {
    file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TelemetryOverlay {
    log_level: Option<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided it replaces the local override. It is returned
/// even when missing, so loading reports it instead of falling back.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/syneplayer/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("syneplayer/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("syneplayer.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read and parse a TOML file into an overlay.
pub(crate) fn load_overlay(path: &Path) -> Result<ConfigOverlay, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

fn parse_toml(contents: &str, path: &Path) -> Result<ConfigOverlay, ConfigError> {
    toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load a single file on top of the compiled defaults.
pub fn load_from_file(path: &Path) -> Result<SyneConfig, ConfigError> {
    let mut config = SyneConfig::default();
    apply_overlay(&mut config, load_overlay(path)?);
    Ok(config)
}

/// Apply the fields an overlay sets; everything else is left alone.
pub(crate) fn apply_overlay(config: &mut SyneConfig, overlay: ConfigOverlay) {
    let ConfigOverlay {
        network,
        sync,
        media,
        telemetry,
    } = overlay;

    if let Some(v) = network.master_host {
        config.network.master_host = v;
    }
    if let Some(v) = network.clock_port {
        config.network.clock_port = v;
    }
    if let Some(v) = network.rpc_port {
        config.network.rpc_port = v;
    }

    if let Some(v) = sync.poll_interval_ms {
        config.sync.poll_interval_ms = v;
    }
    if let Some(v) = sync.rpc_timeout_ms {
        config.sync.rpc_timeout_ms = v;
    }
    if let Some(v) = sync.rpc_retries {
        config.sync.rpc_retries = v;
    }

    if let Some(v) = media.file {
        config.media.file = Some(expand_path(&v));
    }

    if let Some(v) = telemetry.log_level {
        config.telemetry.log_level = v;
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut SyneConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from an arbitrary key lookup (the process environment in production).
///
/// Numeric values that fail to parse are ignored rather than clobbering the config.
pub fn apply_overrides_from<F>(config: &mut SyneConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("SYNEPLAYER_MASTER_HOST") {
        config.network.master_host = v;
        sources.env_overrides.push("SYNEPLAYER_MASTER_HOST".to_string());
    }
    if let Some(port) = lookup("SYNEPLAYER_CLOCK_PORT").and_then(|v| v.parse().ok()) {
        config.network.clock_port = port;
        sources.env_overrides.push("SYNEPLAYER_CLOCK_PORT".to_string());
    }
    if let Some(port) = lookup("SYNEPLAYER_RPC_PORT").and_then(|v| v.parse().ok()) {
        config.network.rpc_port = port;
        sources.env_overrides.push("SYNEPLAYER_RPC_PORT".to_string());
    }

    if let Some(ms) = lookup("SYNEPLAYER_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        config.sync.poll_interval_ms = ms;
        sources.env_overrides.push("SYNEPLAYER_POLL_INTERVAL_MS".to_string());
    }
    if let Some(ms) = lookup("SYNEPLAYER_RPC_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        config.sync.rpc_timeout_ms = ms;
        sources.env_overrides.push("SYNEPLAYER_RPC_TIMEOUT_MS".to_string());
    }
    if let Some(n) = lookup("SYNEPLAYER_RPC_RETRIES").and_then(|v| v.parse().ok()) {
        config.sync.rpc_retries = n;
        sources.env_overrides.push("SYNEPLAYER_RPC_RETRIES".to_string());
    }

    if let Some(v) = lookup("SYNEPLAYER_MEDIA_FILE") {
        config.media.file = Some(expand_path(&v));
        sources.env_overrides.push("SYNEPLAYER_MEDIA_FILE".to_string());
    }

    if let Some(v) = lookup("SYNEPLAYER_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("SYNEPLAYER_LOG_LEVEL".to_string());
    }
    // RUST_LOG wins over everything
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}
