//! ZMQ socket setup shared by the publisher and the client.
//!
//! Every socket is created with LINGER = 0 so closing one never blocks on
//! undelivered messages; a stopped master or a dropped slave socket goes
//! away immediately.

use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use futures::Sink;
use tracing::debug;

pub use tmq::{Context as ZmqContext, Multipart, TmqError};

/// Boxed sink type for sending messages
pub type BoxedSink = Pin<Box<dyn Sink<Multipart, Error = TmqError> + Send>>;

/// Boxed stream type for receiving messages
pub type BoxedStream = Pin<Box<dyn Stream<Item = Result<Multipart, TmqError>> + Send>>;

/// A socket split into independently owned send and receive halves.
pub struct SplitSocket {
    pub tx: BoxedSink,
    pub rx: BoxedStream,
}

fn split_socket<S>(socket: S) -> SplitSocket
where
    S: Stream<Item = Result<Multipart, TmqError>>
        + Sink<Multipart, Error = TmqError>
        + Unpin
        + Send
        + 'static,
{
    let (tx, rx) = socket.split();
    SplitSocket {
        tx: Box::pin(tx),
        rx: Box::pin(rx),
    }
}

/// Create a DEALER socket and connect it.
///
/// Connecting does not wait for the peer: libzmq establishes the TCP
/// connection in the background, so this succeeds while the master is down.
pub fn create_dealer_and_connect(
    ctx: &ZmqContext,
    endpoint: &str,
    name: &str,
) -> Result<SplitSocket, TmqError> {
    let socket = tmq::dealer(ctx).set_linger(0).connect(endpoint)?;
    debug!("{}: DEALER connected to {}", name, endpoint);
    Ok(split_socket(socket))
}

/// Create a ROUTER socket and bind it. Fails if the endpoint is taken.
pub fn create_router_and_bind(
    ctx: &ZmqContext,
    endpoint: &str,
    name: &str,
) -> Result<SplitSocket, TmqError> {
    let socket = tmq::router(ctx).set_linger(0).bind(endpoint)?;
    debug!("{}: ROUTER bound to {}", name, endpoint);
    Ok(split_socket(socket))
}

pub fn frames_to_multipart(frames: &[Bytes]) -> Multipart {
    frames
        .iter()
        .map(|f| f.to_vec())
        .collect::<Vec<_>>()
        .into()
}

pub fn multipart_to_frames(mp: Multipart) -> Vec<Bytes> {
    mp.into_iter().map(|m| Bytes::from(m.to_vec())).collect()
}
