//! Log-only engine for nodes without a rendering backend.
//!
//! It still behaves like an exclusive output device: a second engine cannot
//! start while one is live, and the surface survives resyncs.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use syneproto::Epoch;
use tracing::info;

use crate::clock::{Clock, ClockSource};
use crate::engine::{EngineBinding, EngineError, EngineFactory, PlaybackEngine};

/// Stand-in for a window; numbered so reuse shows up in logs.
#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessSurface {
    pub id: u32,
}

pub struct HeadlessEngine {
    epoch: Epoch,
    clock: Arc<dyn Clock>,
    source: ClockSource,
    media: Option<PathBuf>,
    surface: HeadlessSurface,
    live: Arc<AtomicBool>,
}

impl HeadlessEngine {
    /// How far into the stream this node is, by its clock.
    pub fn position(&self) -> Duration {
        let now = self.clock.now().as_nanos();
        Duration::from_nanos(now.saturating_sub(self.epoch.as_nanos()))
    }

    pub fn surface_id(&self) -> u32 {
        self.surface.id
    }
}

impl PlaybackEngine for HeadlessEngine {
    type Surface = HeadlessSurface;

    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn stop(self) -> Option<HeadlessSurface> {
        info!(
            "engine stopped: epoch {} at position {:?} ({}, media {:?})",
            self.epoch,
            self.position(),
            self.source,
            self.media
        );
        self.live.store(false, Ordering::Release);
        Some(self.surface)
    }
}

pub struct HeadlessFactory {
    clock: Arc<dyn Clock>,
    next_surface: u32,
    live: Arc<AtomicBool>,
}

impl HeadlessFactory {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            next_surface: 1,
            live: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl EngineFactory for HeadlessFactory {
    type Engine = HeadlessEngine;

    fn start(
        &mut self,
        binding: &EngineBinding,
        surface: &mut Option<HeadlessSurface>,
    ) -> Result<HeadlessEngine, EngineError> {
        if let Some(path) = &binding.media {
            if !path.exists() {
                return Err(EngineError::Media(format!("{} not found", path.display())));
            }
        }

        if self.live.swap(true, Ordering::AcqRel) {
            return Err(EngineError::Busy("another engine is still running".into()));
        }

        let surface = surface.take().unwrap_or_else(|| {
            let id = self.next_surface;
            self.next_surface += 1;
            HeadlessSurface { id }
        });

        info!(
            "engine started: epoch {} on surface #{} ({})",
            binding.epoch, surface.id, binding.clock
        );

        Ok(HeadlessEngine {
            epoch: binding.epoch,
            clock: Arc::clone(&self.clock),
            source: binding.clock.clone(),
            media: binding.media.clone(),
            surface,
            live: Arc::clone(&self.live),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    fn factory(now: u64) -> HeadlessFactory {
        HeadlessFactory::new(Arc::new(FixedClock(Epoch::from_nanos(now))))
    }

    fn binding(epoch: u64) -> EngineBinding {
        EngineBinding {
            epoch: Epoch::from_nanos(epoch),
            clock: ClockSource::Provide { port: 20000 },
            media: None,
        }
    }

    #[test]
    fn reports_position_from_epoch() {
        let mut factory = factory(5_000_000_000);
        let engine = factory.start(&binding(2_000_000_000), &mut None).unwrap();
        assert_eq!(engine.position(), Duration::from_secs(3));
        assert_eq!(engine.epoch(), Epoch::from_nanos(2_000_000_000));
    }

    #[test]
    fn surface_survives_restart() {
        let mut factory = factory(0);
        let mut slot = None;

        let first = factory.start(&binding(1000), &mut slot).unwrap();
        let id = first.surface_id();
        slot = first.stop();

        let second = factory.start(&binding(2000), &mut slot).unwrap();
        assert_eq!(second.surface_id(), id);
        assert!(slot.is_none());
    }

    #[test]
    fn refuses_second_live_engine() {
        let mut factory = factory(0);
        let first = factory.start(&binding(1000), &mut None).unwrap();
        assert!(matches!(
            factory.start(&binding(2000), &mut None),
            Err(EngineError::Busy(_))
        ));
        first.stop();
        assert!(factory.start(&binding(2000), &mut None).is_ok());
    }

    #[test]
    fn missing_media_fails() {
        let mut factory = factory(0);
        let mut binding = binding(1000);
        binding.media = Some(PathBuf::from("/nonexistent/syneplayer/loop.ogg"));
        assert!(matches!(
            factory.start(&binding, &mut None),
            Err(EngineError::Media(_))
        ));
    }
}
