//! Master-side source of truth for the session epoch.

use chrono::{DateTime, Utc};
use std::time::Instant;

use crate::{Epoch, EpochReply, EpochRequest, MasterStatus};

/// Holds the epoch a master session was started with.
///
/// Nothing mutates it after construction, so it is shared behind an `Arc`
/// and read from the publisher task without locking.
#[derive(Debug)]
pub struct EpochStore {
    epoch: Epoch,
    clock_port: u16,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl EpochStore {
    pub fn new(epoch: Epoch, clock_port: u16) -> Self {
        Self {
            epoch,
            clock_port,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn get_epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn status(&self) -> MasterStatus {
        MasterStatus {
            epoch: self.epoch,
            clock_port: self.clock_port,
            started_at: self.started_at,
            uptime_secs: self.started.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Answer one request. Pure read; safe to call from any number of tasks.
    pub fn answer(&self, request: &EpochRequest) -> EpochReply {
        match request {
            EpochRequest::GetEpoch => EpochReply::Epoch {
                epoch: self.get_epoch(),
            },
            EpochRequest::Status => EpochReply::Status(self.status()),
        }
    }
}
