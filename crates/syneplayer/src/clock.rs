//! Local clock reading and the network clock role a node plays.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use syneproto::Epoch;

/// Source of "now" in the master's clock domain.
pub trait Clock: Send + Sync {
    fn now(&self) -> Epoch;
}

/// Wall-clock nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Epoch {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Epoch::from_nanos(nanos)
    }
}

/// A clock that always reads the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Epoch);

impl Clock for FixedClock {
    fn now(&self) -> Epoch {
        self.0
    }
}

/// Which side of the network clock an engine sits on.
///
/// The master provides its clock on `port`; slaves follow the master's
/// provider. Keeping the two agreed is the engine's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockSource {
    Provide { port: u16 },
    Follow { host: String, port: u16 },
}

impl fmt::Display for ClockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockSource::Provide { port } => write!(f, "providing on :{}", port),
            ClockSource::Follow { host, port } => write!(f, "following {}:{}", host, port),
        }
    }
}
