//! Per-payload rate limiting (suppression window)
//!
//! A code held in front of the camera is decoded in every frame. This
//! module remembers when each payload was last logged and refuses to log
//! it again until the suppression interval has passed.
//!
//! State lives in a [`Cooldown`] value owned by one scanning session.
//! Nothing is persisted: a new session starts with every window open.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// Default gap between two logged events for the same payload.
pub const DEFAULT_INTERVAL_SECS: u64 = 5;

/// Result of a cooldown check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownResult {
    /// Never logged, or the interval has strictly elapsed
    Ready,
    /// Logged too recently
    Wait { remaining: Duration },
}

#[derive(Debug, Clone)]
pub struct Cooldown {
    interval: Duration,
    last_logged: HashMap<String, DateTime<Utc>>,
}

impl Cooldown {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_logged: HashMap::new(),
        }
    }

    /// Build from a whole-second interval, as found in configuration.
    pub fn from_secs(secs: u64) -> Self {
        let secs = i64::try_from(secs).unwrap_or(i64::MAX);
        Self::new(Duration::try_seconds(secs).unwrap_or(Duration::MAX))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Check whether `payload` may be logged at `now`.
    ///
    /// An observation at or before the last logged time (a clock stepping
    /// backwards) always waits.
    pub fn check(&self, payload: &str, now: DateTime<Utc>) -> CooldownResult {
        let Some(last) = self.last_logged.get(payload) else {
            return CooldownResult::Ready;
        };

        let elapsed = now.signed_duration_since(*last);
        if elapsed > self.interval {
            CooldownResult::Ready
        } else {
            CooldownResult::Wait {
                remaining: self.interval - elapsed.max(Duration::zero()),
            }
        }
    }

    /// Record that `payload` was just logged.
    ///
    /// Never moves a payload's timestamp backwards.
    pub fn record(&mut self, payload: &str, now: DateTime<Utc>) {
        match self.last_logged.get_mut(payload) {
            Some(last) => *last = (*last).max(now),
            None => {
                self.last_logged.insert(payload.to_owned(), now);
            }
        }
    }

    /// Check and record in one step.
    ///
    /// Returns `Ok(())` if the payload may be logged (and records it),
    /// `Err(remaining)` if it is still inside its window.
    pub fn gate(&mut self, payload: &str, now: DateTime<Utc>) -> Result<(), Duration> {
        match self.check(payload, now) {
            CooldownResult::Ready => {
                self.record(payload, now);
                Ok(())
            }
            CooldownResult::Wait { remaining } => Err(remaining),
        }
    }

    pub fn last_logged(&self, payload: &str) -> Option<DateTime<Utc>> {
        self.last_logged.get(payload).copied()
    }

    /// Number of payloads with a recorded window.
    pub fn tracked(&self) -> usize {
        self.last_logged.len()
    }
}

impl Default for Cooldown {
    fn default() -> Self {
        Self::from_secs(DEFAULT_INTERVAL_SECS)
    }
}
