//! Per-sender sliding window rate limiting for inbound messages

use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::warn;

/// Allows at most `max_events` per key within any `window`
pub struct RateLimiter {
    max_events: usize,
    window: Duration,
    events: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_events: usize, window: Duration) -> Self {
        Self {
            max_events,
            window,
            events: DashMap::new(),
        }
    }

    /// Record an event for `key` if it is under the limit.
    /// Returns `false` (and records nothing) when the key is over the limit.
    pub fn check_and_record(&self, key: &str) -> bool {
        self.check_and_record_at(key, Instant::now())
    }

    fn check_and_record_at(&self, key: &str, now: Instant) -> bool {
        let mut entry = self.events.entry(key.to_string()).or_default();
        while let Some(oldest) = entry.front() {
            if now.duration_since(*oldest) >= self.window {
                entry.pop_front();
            } else {
                break;
            }
        }

        if entry.len() >= self.max_events {
            warn!(
                "Rate limit exceeded for {} ({} events in {:?})",
                key, self.max_events, self.window
            );
            return false;
        }

        entry.push_back(now);
        true
    }

    /// Forget keys with no events left inside the window
    pub fn prune(&self) {
        self.prune_at(Instant::now());
    }

    fn prune_at(&self, now: Instant) {
        let window = self.window;
        self.events.retain(|_, events| {
            events
                .back()
                .is_some_and(|newest| now.duration_since(*newest) < window)
        });
    }

    /// Number of keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.events.len()
    }
}
