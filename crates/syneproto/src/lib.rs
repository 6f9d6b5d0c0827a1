//! Epoch protocol between a syneplayer master and its slaves.
//!
//! The master publishes one value, the epoch its playback session is anchored
//! to, and slaves poll for it. Everything travels as SYNE01 multipart frames
//! over ZMQ ROUTER/DEALER sockets:
//!
//! - [`EpochStore`] holds the master's epoch
//! - [`ClockPublisher`] serves it on a ROUTER socket
//! - [`EpochClient`] fetches it with Lazy Pirate retries over a DEALER socket

pub mod client;
pub mod epoch;
pub mod error;
pub mod frame;
pub mod lazy_pirate;
pub mod messages;
pub mod publisher;
pub mod socket_config;
pub mod store;

pub use client::{ClientConfig, ConnectionState, EpochClient, EpochSource, HealthTracker};
pub use epoch::Epoch;
pub use error::{FetchError, ProtocolError, PublisherError, TransportError};
pub use frame::{Command, ContentType, FrameError, SyneFrame, EPOCH_SERVICE, PROTOCOL_VERSION};
pub use lazy_pirate::LazyPirateConfig;
pub use messages::{EpochReply, EpochRequest, MasterStatus};
pub use publisher::{ClockPublisher, PublisherHandle};
pub use store::EpochStore;
