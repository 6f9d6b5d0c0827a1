//! The slave's poll loop: one task owns the controller and feeds it outcomes.

use std::time::Duration;

use syneproto::EpochSource;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::controller::{PollOutcome, SyncController, SyncReport, SyncState};
use crate::engine::EngineFactory;

/// Handle to a running poll loop.
pub struct SlaveHandle {
    state: watch::Receiver<SyncState>,
    cancel: CancellationToken,
    task: JoinHandle<SyncReport>,
}

impl SlaveHandle {
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    /// Token that stops the loop when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ask the loop to stop and wait until the engine is torn down.
    pub async fn stop(self) -> Result<SyncReport, JoinError> {
        self.cancel.cancel();
        self.task.await
    }
}

/// Spawn the loop. The first poll happens immediately, then every `poll_interval`.
///
/// Cancelling `cancel` interrupts a pending tick or an in-flight fetch; the
/// loop then shuts the controller down before the task finishes.
pub fn spawn_sync_loop<F, S>(
    controller: SyncController<F>,
    source: S,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> SlaveHandle
where
    F: EngineFactory + 'static,
    S: EpochSource + 'static,
{
    let state = controller.subscribe();
    let task = tokio::spawn(run(controller, source, poll_interval, cancel.clone()));

    SlaveHandle {
        state,
        cancel,
        task,
    }
}

async fn run<F, S>(
    mut controller: SyncController<F>,
    source: S,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> SyncReport
where
    F: EngineFactory,
    S: EpochSource,
{
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("polling master epoch every {:?}", poll_interval);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = source.fetch_epoch() => PollOutcome::from(result),
        };

        let transition = controller.handle(outcome);
        debug!("poll: {:?} -> {:?}", transition, controller.state());
    }

    info!("stop requested, tearing down playback");
    controller.shutdown()
}
