//! Progress update throttle
//!
//! Producers can emit `progress_update` far faster than a display refreshes.
//! Each update is a full snapshot, so dropping superseded ones loses nothing.

#[cfg(any(test, feature = "test-util"))]
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::dto::event::JobEvent;

/// Minimum spacing between two accepted `progress_update` events
pub const PROGRESS_THROTTLE_INTERVAL: Duration = Duration::from_millis(100);

/// Time source for the throttle
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
///
/// Clones share the same time. Available to other crates with the
/// `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

#[cfg(any(test, feature = "test-util"))]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Per-job rate limiter for `progress_update` events
///
/// All other event types always pass.
#[derive(Debug, Clone, Default)]
pub struct UpdateThrottle {
    last_accepted: Option<Instant>,
}

impl UpdateThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether `event`, arriving at `now`, should be applied
    ///
    /// Only an accepted `progress_update` moves the throttle window.
    pub fn admit(&mut self, event: &JobEvent, now: Instant) -> bool {
        if !event.is_progress_update() {
            return true;
        }

        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < PROGRESS_THROTTLE_INTERVAL {
                return false;
            }
        }

        self.last_accepted = Some(now);
        true
    }

    /// Forgets the last accepted update
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}
