//! Per-identity counter record and the blocked-state predicate.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// The stored rate limit state for one client identity.
///
/// Serialized as `{"key": ..., "count": ..., "blocked_at": ...}` where
/// `blocked_at` is seconds since the epoch and `0` means not blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    /// The client identity, also used as the storage key
    pub key: String,
    /// Requests admitted since the last reset
    pub count: u64,
    /// When the identity was blocked (epoch seconds, 0 = unset)
    pub blocked_at: i64,
}

impl CounterRecord {
    /// Create a fresh, unblocked record with a zero count.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            count: 0,
            blocked_at: 0,
        }
    }

    /// A record that admitted one more request than `self`.
    pub fn incremented(&self) -> Self {
        Self {
            key: self.key.clone(),
            count: self.count + 1,
            blocked_at: 0,
        }
    }

    /// A record transitioned into the blocked state at `now`.
    pub fn blocked(&self, now: DateTime<Utc>) -> Self {
        Self {
            key: self.key.clone(),
            count: 0,
            blocked_at: now.timestamp(),
        }
    }

    /// Whether the block window is still active at `now`.
    ///
    /// There is no stored unblock transition: a record stops being blocked as
    /// soon as `now` reaches `blocked_at + block_duration`.
    pub fn is_blocked(&self, now: DateTime<Utc>, block_duration: Duration) -> bool {
        if self.blocked_at <= 0 {
            return false;
        }

        let Some(blocked_at) = DateTime::<Utc>::from_timestamp(self.blocked_at, 0) else {
            return false;
        };
        let block = TimeDelta::from_std(block_duration).unwrap_or(TimeDelta::MAX);

        match blocked_at.checked_add_signed(block) {
            Some(release_at) => now < release_at,
            None => true,
        }
    }
}
