//! Slave-side state machine that keeps the local engine on the master's epoch.
//!
//! The controller is fed one [`PollOutcome`] per tick and reacts:
//!
//! | state             | outcome          | effect                             |
//! |-------------------|------------------|------------------------------------|
//! | `AwaitingMaster`  | fetched E        | start engine on E, `Synced(E)`     |
//! | `AwaitingMaster`  | failed           | nothing                            |
//! | `Synced(E)`       | fetched E        | nothing                            |
//! | `Synced(E)`       | fetched E' != E  | stop engine, start on E'           |
//! | `Synced(E)`       | failed           | nothing, engine keeps playing      |
//!
//! `Resyncing` is only visible to watchers while the old engine is being
//! replaced. Handling an outcome runs to completion before the next one is
//! looked at, so a resync can never overlap another.

use std::path::PathBuf;

use syneproto::{Epoch, FetchError};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::clock::ClockSource;
use crate::engine::{EngineBinding, EngineError, EngineFactory, PlaybackEngine, SurfaceOf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No epoch seen yet
    AwaitingMaster,
    /// Last successful fetch returned this epoch
    Synced(Epoch),
    /// Old engine is being torn down and a new one started
    Resyncing { from: Epoch, to: Epoch },
}

impl SyncState {
    pub fn epoch(&self) -> Option<Epoch> {
        match self {
            SyncState::AwaitingMaster => None,
            SyncState::Synced(epoch) => Some(*epoch),
            SyncState::Resyncing { to, .. } => Some(*to),
        }
    }
}

/// Result of one poll of the master.
#[derive(Debug)]
pub enum PollOutcome {
    Fetched(Epoch),
    Failed(FetchError),
}

impl From<Result<Epoch, FetchError>> for PollOutcome {
    fn from(result: Result<Epoch, FetchError>) -> Self {
        match result {
            Ok(epoch) => PollOutcome::Fetched(epoch),
            Err(err) => PollOutcome::Failed(err),
        }
    }
}

/// What handling one outcome did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Fetch failed; state and engine untouched
    Unreachable,
    /// Engine started with no engine running before
    Started(Epoch),
    /// Same epoch as the running engine
    Steady,
    /// Old engine stopped and a new one started
    Resynced { from: Epoch, to: Epoch },
    /// Engine for this epoch failed to start; retried on the next successful fetch
    StartFailed(Epoch),
}

/// Running totals, returned when the controller shuts down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub fetches: u64,
    pub failures: u64,
    pub engines_started: u64,
    pub engines_stopped: u64,
    pub start_failures: u64,
}

pub struct SyncController<F: EngineFactory> {
    factory: F,
    clock: ClockSource,
    media: Option<PathBuf>,
    state: SyncState,
    state_tx: watch::Sender<SyncState>,
    engine: Option<F::Engine>,
    /// Surface handed back by the last stopped engine.
    surface: Option<SurfaceOf<F>>,
    report: SyncReport,
}

impl<F: EngineFactory> SyncController<F> {
    pub fn new(factory: F, clock: ClockSource, media: Option<PathBuf>) -> Self {
        let (state_tx, _) = watch::channel(SyncState::AwaitingMaster);
        Self {
            factory,
            clock,
            media,
            state: SyncState::AwaitingMaster,
            state_tx,
            engine: None,
            surface: None,
            report: SyncReport::default(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state_tx.subscribe()
    }

    /// Epoch of the engine that is actually running, if any.
    pub fn bound_epoch(&self) -> Option<Epoch> {
        self.engine.as_ref().map(|engine| engine.epoch())
    }

    pub fn report(&self) -> &SyncReport {
        &self.report
    }

    pub fn handle(&mut self, outcome: PollOutcome) -> Transition {
        self.report.fetches += 1;

        let fetched = match outcome {
            PollOutcome::Fetched(epoch) => epoch,
            PollOutcome::Failed(err) => {
                self.report.failures += 1;
                match self.state {
                    SyncState::Synced(epoch) if self.engine.is_some() => {
                        warn!("epoch poll failed, keeping epoch {}: {}", epoch, err)
                    }
                    _ => warn!("master unreachable: {}", err),
                }
                return Transition::Unreachable;
            }
        };

        match self.state {
            SyncState::Synced(current) if current == fetched => {
                if self.engine.is_some() {
                    Transition::Steady
                } else {
                    self.start_fresh(fetched)
                }
            }
            SyncState::Synced(current) | SyncState::Resyncing { from: current, .. } => {
                self.resync(current, fetched)
            }
            SyncState::AwaitingMaster => self.start_fresh(fetched),
        }
    }

    /// Terminal: stop the engine. The controller should be dropped afterwards.
    pub fn shutdown(&mut self) -> SyncReport {
        self.teardown();
        info!(
            "sync controller stopped after {} polls ({} failed, {} engines started)",
            self.report.fetches, self.report.failures, self.report.engines_started
        );
        self.report.clone()
    }

    fn start_fresh(&mut self, epoch: Epoch) -> Transition {
        match self.construct(epoch) {
            Ok(()) => {
                info!("synced to master epoch {}", epoch);
                self.set_state(SyncState::Synced(epoch));
                Transition::Started(epoch)
            }
            // Keeps AwaitingMaster, or Synced(epoch) bookkeeping without an engine
            Err(_) => Transition::StartFailed(epoch),
        }
    }

    fn resync(&mut self, from: Epoch, to: Epoch) -> Transition {
        info!("master epoch changed {} -> {}, resyncing", from, to);
        self.set_state(SyncState::Resyncing { from, to });

        self.teardown();

        match self.construct(to) {
            Ok(()) => {
                self.set_state(SyncState::Synced(to));
                Transition::Resynced { from, to }
            }
            Err(_) => {
                self.set_state(SyncState::Synced(from));
                Transition::StartFailed(to)
            }
        }
    }

    fn construct(&mut self, epoch: Epoch) -> Result<(), EngineError> {
        debug_assert!(self.engine.is_none(), "engine still running");

        let binding = EngineBinding {
            epoch,
            clock: self.clock.clone(),
            media: self.media.clone(),
        };

        match self.factory.start(&binding, &mut self.surface) {
            Ok(engine) => {
                self.engine = Some(engine);
                self.report.engines_started += 1;
                Ok(())
            }
            Err(err) => {
                self.report.start_failures += 1;
                warn!(
                    "failed to start engine for epoch {}, retrying after the next successful poll: {}",
                    epoch, err
                );
                Err(err)
            }
        }
    }

    /// Stop the engine synchronously and keep its surface for the next one.
    fn teardown(&mut self) {
        if let Some(engine) = self.engine.take() {
            if let Some(surface) = engine.stop() {
                self.surface = Some(surface);
            }
            self.report.engines_stopped += 1;
        }
    }

    fn set_state(&mut self, state: SyncState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }
}

impl<F: EngineFactory> Drop for SyncController<F> {
    fn drop(&mut self) {
        self.teardown();
    }
}
