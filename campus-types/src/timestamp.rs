//! Wall-clock millisecond timestamps.
//!
//! Cache freshness and backoff eligibility are both read-time comparisons
//! against a milliseconds-since-epoch value, so a single ordered newtype
//! covers every timestamp in the coordinator.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnixMillis(u64);

impl UnixMillis {
    /// The Unix epoch itself; useful as an "always eligible" sentinel.
    pub const EPOCH: Self = Self(0);

    /// Creates a timestamp at the current time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before Unix epoch")
            .as_millis() as u64;
        Self(millis)
    }

    /// Creates a timestamp from raw milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the raw millisecond value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed from `self` to `now`; zero if `self` is in
    /// the future.
    #[must_use]
    pub const fn saturating_elapsed(&self, now: Self) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// Returns this timestamp advanced by `millis`.
    #[must_use]
    pub const fn saturating_add(&self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}
