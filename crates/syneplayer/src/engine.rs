//! The playback engine capability the control plane drives.
//!
//! Decoding, rendering and the network clock wire protocol all live behind
//! these traits. The control plane only starts an engine for an epoch, asks
//! which epoch it is rendering against, and stops it.

use std::path::PathBuf;

use syneproto::Epoch;
use thiserror::Error;

use crate::clock::ClockSource;

/// Everything an engine needs to join a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineBinding {
    pub epoch: Epoch,
    pub clock: ClockSource,
    pub media: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("playback device busy: {0}")]
    Busy(String),
    #[error("media unavailable: {0}")]
    Media(String),
    #[error("clock setup failed: {0}")]
    Clock(String),
}

/// One running playback session bound to one epoch.
pub trait PlaybackEngine: Send {
    /// Display or output resource that can outlive a session.
    type Surface: Send;

    fn epoch(&self) -> Epoch;

    /// Tear the session down. Returns when nothing of it is running any more,
    /// handing back the surface if it can be reused.
    fn stop(self) -> Option<Self::Surface>;
}

/// Builds engines.
pub trait EngineFactory: Send {
    type Engine: PlaybackEngine;

    /// Start an engine for `binding`.
    ///
    /// `surface` holds a surface left behind by a previous engine, if any.
    /// The factory takes it when it reuses it and leaves it otherwise.
    fn start(
        &mut self,
        binding: &EngineBinding,
        surface: &mut Option<<Self::Engine as PlaybackEngine>::Surface>,
    ) -> Result<Self::Engine, EngineError>;
}

pub type SurfaceOf<F> = <<F as EngineFactory>::Engine as PlaybackEngine>::Surface;
