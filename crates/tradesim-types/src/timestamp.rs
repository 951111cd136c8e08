use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Wall-clock instant with nanosecond resolution.
///
/// Used as a block's creation stamp. The canonical byte form feeds the
/// chain-link hash, so it must stay stable across platforms.
///
/// Ordering: `secs` then `nanos`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    /// Whole seconds since the UNIX epoch.
    pub secs: u64,
    /// Sub-second nanoseconds, always below 1_000_000_000.
    pub nanos: u32,
}

impl Timestamp {
    /// Length of [`Timestamp::to_bytes`].
    pub const ENCODED_LEN: usize = 12;

    /// Create a timestamp with explicit values. Excess nanoseconds carry
    /// into `secs`, saturating at the latest representable instant.
    pub fn new(secs: u64, nanos: u32) -> Self {
        let carry = u64::from(nanos / NANOS_PER_SEC);
        match secs.checked_add(carry) {
            Some(secs) => Self {
                secs,
                nanos: nanos % NANOS_PER_SEC,
            },
            None => Self::max(),
        }
    }

    /// The latest representable instant.
    pub const fn max() -> Self {
        Self {
            secs: u64::MAX,
            nanos: NANOS_PER_SEC - 1,
        }
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self::from_duration(since_epoch)
    }

    /// The UNIX epoch.
    pub const fn zero() -> Self {
        Self { secs: 0, nanos: 0 }
    }

    fn from_duration(d: Duration) -> Self {
        Self {
            secs: d.as_secs(),
            nanos: d.subsec_nanos(),
        }
    }

    /// Canonical big-endian encoding: 8 bytes of seconds, 4 of nanos.
    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[..8].copy_from_slice(&self.secs.to_be_bytes());
        out[8..].copy_from_slice(&self.nanos.to_be_bytes());
        out
    }

    /// Milliseconds since the UNIX epoch, saturating.
    pub fn as_millis(&self) -> u64 {
        self.secs
            .saturating_mul(1_000)
            .saturating_add(u64::from(self.nanos / 1_000_000))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}.{:09})", self.secs, self.nanos)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nanos)
    }
}
