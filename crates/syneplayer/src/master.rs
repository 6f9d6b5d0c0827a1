//! Master lifecycle: mint an epoch, serve it, play locally.

use std::path::PathBuf;
use std::sync::Arc;

use syneconf::SyneConfig;
use syneproto::{ClockPublisher, Epoch, EpochStore, PublisherError, PublisherHandle};
use thiserror::Error;
use tracing::{error, info};

use crate::clock::{Clock, ClockSource};
use crate::engine::{EngineBinding, EngineError, EngineFactory, PlaybackEngine};

#[derive(Debug, Error)]
pub enum MasterError {
    #[error(transparent)]
    Publisher(#[from] PublisherError),
    #[error("failed to start local playback: {0}")]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterConfig {
    /// Endpoint the epoch service binds, e.g. `tcp://0.0.0.0:8000`
    pub rpc_endpoint: String,
    pub clock_port: u16,
    pub media: Option<PathBuf>,
}

impl MasterConfig {
    pub fn from_config(config: &SyneConfig) -> Self {
        Self {
            rpc_endpoint: config.network.rpc_bind_endpoint(),
            clock_port: config.network.clock_port,
            media: config.media.file.clone(),
        }
    }
}

/// The epoch and the local engine playing against it.
pub struct MasterSession<E> {
    store: Arc<EpochStore>,
    engine: E,
}

impl<E: PlaybackEngine> MasterSession<E> {
    pub fn epoch(&self) -> Epoch {
        self.store.get_epoch()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

/// A running master: epoch service plus local playback.
pub struct MasterServer<E> {
    session: MasterSession<E>,
    publisher: PublisherHandle,
}

impl<E: PlaybackEngine> MasterServer<E> {
    /// Start a master session. Must be called from within a tokio runtime.
    ///
    /// The epoch is read from `clock` once and fixed for the session. If the
    /// service port is taken nothing is started; if local playback fails the
    /// service is closed again before returning.
    pub fn start<F>(config: MasterConfig, mut factory: F, clock: &dyn Clock) -> Result<Self, MasterError>
    where
        F: EngineFactory<Engine = E>,
    {
        let epoch = clock.now();
        let store = Arc::new(EpochStore::new(epoch, config.clock_port));

        let publisher = ClockPublisher::bind(&config.rpc_endpoint, Arc::clone(&store))?;

        let binding = EngineBinding {
            epoch,
            clock: ClockSource::Provide {
                port: config.clock_port,
            },
            media: config.media,
        };
        let engine = match factory.start(&binding, &mut None) {
            Ok(engine) => engine,
            Err(err) => {
                error!("local playback failed to start, closing epoch service: {}", err);
                drop(publisher);
                return Err(err.into());
            }
        };

        let publisher = publisher.spawn();
        info!(
            "master session started: epoch {} served on {}, clock on :{}",
            epoch,
            publisher.endpoint(),
            config.clock_port
        );

        Ok(Self {
            session: MasterSession { store, engine },
            publisher,
        })
    }

    pub fn epoch(&self) -> Epoch {
        self.session.epoch()
    }

    pub fn session(&self) -> &MasterSession<E> {
        &self.session
    }

    /// Requests answered so far.
    pub fn served(&self) -> u64 {
        self.publisher.served()
    }

    /// Stop serving first, then stop local playback.
    pub async fn shutdown(self) -> Option<E::Surface> {
        let MasterServer { session, publisher } = self;
        publisher.shutdown().await;

        let epoch = session.epoch();
        let surface = session.engine.stop();
        info!("master session {} ended", epoch);
        surface
    }
}
