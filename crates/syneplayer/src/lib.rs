//! syneplayer - synchronized looping playback across machines
//!
//! One master mints an epoch (the instant its playback began) and serves it
//! over ZMQ. Every slave polls the master, starts a local engine against that
//! epoch, and rebuilds the engine whenever the epoch changes, which is how a
//! master restart shows up. Keeping the clocks themselves agreed, and drawing
//! frames, is the engine's job; this crate only manages its lifecycle.
//!
//! ```text
//! EpochStore -> ClockPublisher ==(tcp)==> EpochClient -> SyncController -> PlaybackEngine
//! ```

pub mod clock;
pub mod controller;
pub mod engine;
pub mod headless;
pub mod master;
pub mod poller;
pub mod slave;
pub mod telemetry;

pub use clock::{Clock, ClockSource, FixedClock, SystemClock};
pub use controller::{PollOutcome, SyncController, SyncReport, SyncState, Transition};
pub use engine::{EngineBinding, EngineError, EngineFactory, PlaybackEngine, SurfaceOf};
pub use headless::{HeadlessEngine, HeadlessFactory, HeadlessSurface};
pub use master::{MasterConfig, MasterError, MasterServer, MasterSession};
pub use poller::{spawn_sync_loop, SlaveHandle};
pub use slave::{SlaveConfig, SlaveNode};
