//! Slave-side DEALER client that asks a master for its epoch.
//!
//! Following zguide's Lazy Pirate pattern:
//! - connect() is non-blocking, the master doesn't need to exist yet
//! - every attempt is bounded by a timeout
//! - a socket that timed out is thrown away and a fresh one opened for the
//!   retry, so a late reply can never be paired with the wrong request
//!
//! Usage:
//! ```ignore
//! let client = EpochClient::new(ClientConfig::new("slave", "tcp://10.0.0.1:8000"));
//! let epoch = client.fetch_epoch().await?;
//! ```

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::error::{FetchError, ProtocolError, TransportError};
use crate::frame::{Command, SyneFrame, EPOCH_SERVICE};
use crate::lazy_pirate::LazyPirateConfig;
use crate::socket_config::{
    create_dealer_and_connect, frames_to_multipart, multipart_to_frames, SplitSocket, ZmqContext,
};
use crate::{Epoch, EpochReply, EpochRequest, MasterStatus};

/// Whether the master answered our most recent request.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected = 0,
    Connected = 1,
}

impl ConnectionState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
        }
    }
}

/// Health tracking based on request/response success
#[derive(Debug)]
pub struct HealthTracker {
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    last_success: RwLock<Option<Instant>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            consecutive_failures: AtomicU32::new(0),
            last_success: RwLock::new(None),
        }
    }

    pub fn get_state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn is_connected(&self) -> bool {
        self.get_state() == ConnectionState::Connected
    }

    pub async fn record_success(&self) {
        *self.last_success.write().await = Some(Instant::now());
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.state
            .store(ConnectionState::Connected as u8, Ordering::Relaxed);
    }

    /// Any failed attempt drops us back to Disconnected; returns the failure streak.
    pub fn record_failure(&self) -> u32 {
        self.state
            .store(ConnectionState::Disconnected as u8, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub async fn last_success(&self) -> Option<Instant> {
        *self.last_success.read().await
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for EpochClient
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Name used in logs
    pub name: String,
    /// Master RPC endpoint (e.g., "tcp://192.168.1.10:8000")
    pub endpoint: String,
    pub pirate: LazyPirateConfig,
}

impl ClientConfig {
    pub fn new(name: &str, endpoint: &str) -> Self {
        Self {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            pirate: LazyPirateConfig::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.pirate.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.pirate.max_retries = max_retries;
        self
    }

    pub fn with_pirate(mut self, pirate: LazyPirateConfig) -> Self {
        self.pirate = pirate;
        self
    }
}

/// Anything that can produce the master's current epoch.
///
/// The poll loop only sees this trait, so it can run against a scripted
/// source in tests.
#[async_trait]
pub trait EpochSource: Send + Sync {
    async fn fetch_epoch(&self) -> Result<Epoch, FetchError>;
}

#[async_trait]
impl<T: EpochSource + ?Sized> EpochSource for Arc<T> {
    async fn fetch_epoch(&self) -> Result<Epoch, FetchError> {
        (**self).fetch_epoch().await
    }
}

/// Remote epoch reader for one master address.
///
/// Holds no cached epoch: every fetch is a fresh round trip.
pub struct EpochClient {
    config: ClientConfig,
    context: ZmqContext,
    /// `None` until the first fetch, and again after any failed attempt.
    socket: Mutex<Option<SplitSocket>>,
    health: HealthTracker,
}

impl EpochClient {
    /// Never touches the network; the socket is opened by the first fetch.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            context: ZmqContext::new(),
            socket: Mutex::new(None),
            health: HealthTracker::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.health.get_state()
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    pub async fn fetch_status(&self) -> Result<MasterStatus, FetchError> {
        match self.request(&EpochRequest::Status).await? {
            EpochReply::Status(status) => Ok(status),
            other => Err(ProtocolError::UnexpectedReply(format!("{other:?}")).into()),
        }
    }

    async fn request(&self, request: &EpochRequest) -> Result<EpochReply, FetchError> {
        let frame = SyneFrame::request(EPOCH_SERVICE, request)?;
        let pirate = &self.config.pirate;
        let mut retry = 0;

        loop {
            match self.attempt(&frame).await {
                Ok(reply) => {
                    self.health.record_success().await;
                    return Ok(reply);
                }
                Err(err) => {
                    let failures = self.health.record_failure();
                    if retry >= pirate.max_retries {
                        return Err(err);
                    }
                    retry += 1;
                    let backoff = pirate.backoff_for_attempt(retry);
                    debug!(
                        "{}: attempt failed ({}), retry {}/{} in {:?} ({} consecutive failures)",
                        self.config.name, err, retry, pirate.max_retries, backoff, failures
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// One bounded send/receive. The socket goes back in the slot only on success.
    async fn attempt(&self, frame: &SyneFrame) -> Result<EpochReply, FetchError> {
        let mut slot = self.socket.lock().await;
        let mut socket = match slot.take() {
            Some(socket) => socket,
            None => create_dealer_and_connect(&self.context, &self.config.endpoint, &self.config.name)?,
        };

        let timeout = self.config.pirate.timeout;
        match tokio::time::timeout(timeout, exchange(&mut socket, frame)).await {
            Ok(Ok(reply)) => {
                *slot = Some(socket);
                Ok(reply)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(TransportError::Timeout(timeout).into()),
        }
    }
}

#[async_trait]
impl EpochSource for EpochClient {
    async fn fetch_epoch(&self) -> Result<Epoch, FetchError> {
        match self.request(&EpochRequest::GetEpoch).await? {
            EpochReply::Epoch { epoch } => Ok(epoch),
            other => Err(ProtocolError::UnexpectedReply(format!("{other:?}")).into()),
        }
    }
}

async fn exchange(socket: &mut SplitSocket, frame: &SyneFrame) -> Result<EpochReply, FetchError> {
    socket.tx.send(frames_to_multipart(&frame.to_frames())).await?;

    loop {
        let mp = match socket.rx.next().await {
            Some(received) => received?,
            None => return Err(TransportError::Closed.into()),
        };

        let reply = SyneFrame::from_frames(&multipart_to_frames(mp))?;
        if reply.request_id != frame.request_id {
            trace!("discarding orphan reply {}", reply.request_id);
            continue;
        }
        if reply.command != Command::Reply {
            return Err(ProtocolError::UnexpectedCommand(reply.command).into());
        }

        return match reply.payload::<EpochReply>()? {
            EpochReply::Error { message } => Err(ProtocolError::Remote(message).into()),
            other => Ok(other),
        };
    }
}
