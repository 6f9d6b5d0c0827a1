//! Master-side ROUTER service answering epoch requests.
//!
//! Binds a ROUTER socket and answers SYNE01 frames from any number of slaves.
//! The store is immutable, so every request is answered inline in the order
//! it arrived; nothing in the loop waits on anything but the socket.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::PublisherError;
use crate::frame::{Command, SyneFrame, EPOCH_SERVICE, PROTOCOL_VERSION};
use crate::socket_config::{
    create_router_and_bind, frames_to_multipart, multipart_to_frames, SplitSocket, ZmqContext,
};
use crate::{EpochReply, EpochRequest, EpochStore};

/// A bound but not yet serving epoch service.
///
/// Binding happens up front so a taken port is reported before anything
/// else about the master starts. Dropping it closes the socket.
pub struct ClockPublisher {
    endpoint: String,
    store: Arc<EpochStore>,
    socket: SplitSocket,
    context: ZmqContext,
}

impl ClockPublisher {
    /// Must be called from within a tokio runtime.
    pub fn bind(endpoint: &str, store: Arc<EpochStore>) -> Result<Self, PublisherError> {
        let context = ZmqContext::new();
        let socket = create_router_and_bind(&context, endpoint, "publisher").map_err(|source| {
            PublisherError::Bind {
                endpoint: endpoint.to_string(),
                source,
            }
        })?;

        info!(
            "epoch service bound to {} (epoch {})",
            endpoint,
            store.get_epoch()
        );

        Ok(Self {
            endpoint: endpoint.to_string(),
            store,
            socket,
            context,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Start answering requests on a background task.
    pub fn spawn(self) -> PublisherHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let served = Arc::new(AtomicU64::new(0));
        let endpoint = self.endpoint.clone();

        let task = tokio::spawn(self.run(shutdown_rx, Arc::clone(&served)));

        PublisherHandle {
            endpoint,
            shutdown_tx,
            served,
            task,
        }
    }

    async fn run(self, mut shutdown_rx: broadcast::Receiver<()>, served: Arc<AtomicU64>) {
        let ClockPublisher {
            endpoint,
            store,
            socket,
            context,
        } = self;
        let SplitSocket { mut tx, mut rx } = socket;

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("epoch service on {} shutting down", endpoint);
                    break;
                }

                result = rx.next() => {
                    match result {
                        Some(Ok(mp)) => {
                            let Some(reply) = handle_message(&store, multipart_to_frames(mp)) else {
                                continue;
                            };
                            if let Err(e) = tx.send(frames_to_multipart(&reply)).await {
                                error!("failed to send reply: {}", e);
                                continue;
                            }
                            served.fetch_add(1, Ordering::Relaxed);
                        }
                        Some(Err(e)) => {
                            error!("error receiving message: {}", e);
                        }
                        None => {
                            warn!("epoch service socket stream ended");
                            break;
                        }
                    }
                }
            }
        }

        drop(tx);
        drop(rx);
        drop(context);
    }
}

/// Turn one inbound multipart message into the frames to send back, if any.
fn handle_message(store: &EpochStore, frames: Vec<Bytes>) -> Option<Vec<Bytes>> {
    if !frames.iter().any(|f| f.as_ref() == PROTOCOL_VERSION) {
        warn!("received non-SYNE01 message, ignoring");
        return None;
    }

    let (identity, frame) = match SyneFrame::from_frames_with_identity(&frames) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("failed to parse SYNE01 frame: {}", e);
            return None;
        }
    };

    debug!(
        "SYNE01 {:?} service={} request_id={}",
        frame.command, frame.service, frame.request_id
    );

    match frame.command {
        Command::Heartbeat => {
            let mut pong = SyneFrame::heartbeat(EPOCH_SERVICE);
            pong.request_id = frame.request_id;
            Some(pong.to_frames_with_identity(&identity))
        }
        Command::Request => {
            let reply = if frame.service != EPOCH_SERVICE {
                EpochReply::Error {
                    message: format!("unknown service '{}'", frame.service),
                }
            } else {
                match frame.payload::<EpochRequest>() {
                    Ok(request) => store.answer(&request),
                    Err(e) => EpochReply::Error {
                        message: format!("bad request: {e}"),
                    },
                }
            };

            match SyneFrame::reply(frame.request_id, &reply) {
                Ok(reply) => Some(reply.to_frames_with_identity(&identity)),
                Err(e) => {
                    error!("failed to encode reply: {}", e);
                    None
                }
            }
        }
        other => {
            debug!("ignoring command: {:?}", other);
            None
        }
    }
}

/// Running epoch service.
pub struct PublisherHandle {
    endpoint: String,
    shutdown_tx: broadcast::Sender<()>,
    served: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl PublisherHandle {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Requests answered so far.
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }

    /// Stop accepting requests and wait for the socket to close.
    ///
    /// A request already being answered is finished first; anything still
    /// queued is dropped and the slave sees a timeout.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!("epoch service task failed: {}", e);
        }
        info!(
            "epoch service on {} stopped after {} replies",
            self.endpoint,
            self.served.load(Ordering::Relaxed)
        );
    }
}
