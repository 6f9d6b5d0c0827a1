use std::time::Duration;

use thiserror::Error;

use crate::frame::{Command, FrameError};
use crate::socket_config::TmqError;

/// Why a fetch from the master produced no epoch.
///
/// Both kinds are recoverable: the slave logs them and tries again on its
/// next poll.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("protocol: {0}")]
    Protocol(#[from] ProtocolError),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Transport(TransportError::Timeout(_)))
    }
}

/// The master could not be reached, or did not answer in time.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error("socket error: {0}")]
    Socket(#[from] TmqError),
    #[error("socket closed")]
    Closed,
}

/// The master answered with something we could not use.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("unexpected command {0:?}")]
    UnexpectedCommand(Command),
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
    #[error("master error: {0}")]
    Remote(String),
}

impl From<FrameError> for FetchError {
    fn from(err: FrameError) -> Self {
        FetchError::Protocol(ProtocolError::Frame(err))
    }
}

impl From<TmqError> for FetchError {
    fn from(err: TmqError) -> Self {
        FetchError::Transport(TransportError::Socket(err))
    }
}

/// The master could not start serving.
#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("failed to bind epoch service on {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: TmqError,
    },
}
