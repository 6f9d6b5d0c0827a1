//! Slave assembly: epoch client, controller and poll loop.

use std::path::PathBuf;
use std::time::Duration;

use syneconf::{ConfigError, SyneConfig};
use syneproto::{ClientConfig, EpochClient, LazyPirateConfig};
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::clock::ClockSource;
use crate::controller::{SyncController, SyncReport, SyncState};
use crate::engine::EngineFactory;
use crate::poller::{spawn_sync_loop, SlaveHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveConfig {
    /// Master epoch service, e.g. `tcp://192.168.1.10:8000`
    pub master_endpoint: String,
    pub master_host: String,
    pub clock_port: u16,
    pub media: Option<PathBuf>,
    pub poll_interval: Duration,
    pub pirate: LazyPirateConfig,
}

impl SlaveConfig {
    /// Rejects settings where one fetch, retries included, could outlast the
    /// poll interval; those would silently stretch polling.
    pub fn from_config(config: &SyneConfig) -> Result<Self, ConfigError> {
        let slave = Self {
            master_endpoint: config.network.rpc_connect_endpoint(),
            master_host: config.network.master_host.clone(),
            clock_port: config.network.clock_port,
            media: config.media.file.clone(),
            poll_interval: config.sync.poll_interval(),
            pirate: LazyPirateConfig::default()
                .with_timeout(config.sync.rpc_timeout())
                .with_retries(config.sync.rpc_retries),
        };

        let worst_case = slave.pirate.worst_case();
        if worst_case >= slave.poll_interval {
            return Err(ConfigError::Invalid(format!(
                "a fetch can take up to {:?} ({} ms timeout, {} retries), which is not shorter than poll_interval_ms = {}",
                worst_case, config.sync.rpc_timeout_ms, config.sync.rpc_retries, config.sync.poll_interval_ms
            )));
        }
        Ok(slave)
    }
}

pub struct SlaveNode {
    endpoint: String,
    handle: SlaveHandle,
}

impl SlaveNode {
    /// Start polling. Never fails: an absent master is just the first
    /// state of the controller. Must be called from within a tokio runtime.
    pub fn start<F>(config: SlaveConfig, factory: F) -> Self
    where
        F: EngineFactory + 'static,
    {
        let client = EpochClient::new(
            ClientConfig::new("slave", &config.master_endpoint).with_pirate(config.pirate),
        );
        let controller = SyncController::new(
            factory,
            ClockSource::Follow {
                host: config.master_host,
                port: config.clock_port,
            },
            config.media,
        );

        info!("slave following master at {}", config.master_endpoint);
        let handle = spawn_sync_loop(
            controller,
            client,
            config.poll_interval,
            CancellationToken::new(),
        );

        Self {
            endpoint: config.master_endpoint,
            handle,
        }
    }

    pub fn master_endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> SyncState {
        self.handle.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.handle.subscribe()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.handle.cancel_token()
    }

    /// Stop polling and tear down playback.
    pub async fn shutdown(self) -> Result<SyncReport, JoinError> {
        self.handle.stop().await
    }
}
