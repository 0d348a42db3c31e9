// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time sources and the shared last-activity timestamp
//!
//! Every inbound job stamps the tracker and the idle monitor reads it from
//! another task, so the timestamp lives in an atomic rather than behind the
//! controller lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A clock that provides the current time
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Real monotonic clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually driven clock for tests
#[derive(Clone, Debug)]
pub struct FakeClock {
    current: Arc<Mutex<Instant>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += duration;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Last time a job was seen, with millisecond resolution.
///
/// Stored as an offset from the tracker's creation so it fits in an
/// `AtomicU64`. Concurrent handlers may record out of order; the stored value
/// only ever moves forward.
#[derive(Debug)]
pub struct ActivityTracker<C: Clock> {
    clock: C,
    origin: Instant,
    last_ms: AtomicU64,
}

impl<C: Clock> ActivityTracker<C> {
    /// Create a tracker whose last activity is "now"
    pub fn new(clock: C) -> Self {
        let origin = clock.now();
        Self {
            clock,
            origin,
            last_ms: AtomicU64::new(0),
        }
    }

    /// Stamp the current time as the latest activity
    pub fn record(&self) {
        let elapsed = self.clock.now().saturating_duration_since(self.origin);
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.last_ms.fetch_max(ms, Ordering::AcqRel);
    }

    /// Instant of the latest recorded activity
    pub fn last_activity(&self) -> Instant {
        self.origin + Duration::from_millis(self.last_ms.load(Ordering::Acquire))
    }

    /// How long it has been since the latest activity
    pub fn idle_for(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.last_activity())
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
