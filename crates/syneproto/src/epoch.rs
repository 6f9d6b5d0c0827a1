//! The playback epoch ("base time") a master session is anchored to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Nanosecond timestamp in the master's clock domain marking when playback began.
///
/// An epoch identifies a master session. Two values minted by different master
/// lifetimes are unrelated, so the only meaningful comparison is equality; there
/// is no ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(u64);

impl Epoch {
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }
}

impl From<u64> for Epoch {
    fn from(nanos: u64) -> Self {
        Self(nanos)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parses the decimal text form, tolerating surrounding whitespace.
impl FromStr for Epoch {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}
