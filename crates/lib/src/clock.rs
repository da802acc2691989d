//! Time provider abstraction
//!
//! Every shared type, document and operation stamps itself with wall-clock
//! milliseconds. The [`Clock`] trait lets production code use real system
//! time while tests inject a deterministic [`FixedClock`].
//!
//! # Example
//!
//! ```
//! use coedit::{Clock, FixedClock};
//!
//! let clock = FixedClock::new(1000);
//! let t1 = clock.now_millis();
//! let t2 = clock.now_millis();
//! assert!(t2 > t1);
//! ```

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

/// A time provider for getting current timestamps.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current time as milliseconds since Unix epoch.
    fn now_millis(&self) -> u64;

    /// Returns the current time as a UTC datetime.
    fn now_utc(&self) -> DateTime<Utc> {
        millis_to_utc(self.now_millis())
    }
}

/// Convert a millisecond timestamp into a UTC datetime.
///
/// Out-of-range values clamp to the Unix epoch.
pub fn millis_to_utc(millis: u64) -> DateTime<Utc> {
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default()
}

/// Production clock using real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// The clock used when none is injected.
pub(crate) fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// Deterministic clock for tests and simulations.
///
/// Each `now_millis()` call returns the current value and then advances it by
/// `step` milliseconds, so successive stamps are strictly increasing. A step of
/// zero freezes the clock, which is how tests force equal timestamps.
///
/// Cloning shares the underlying counter, so several replicas can be driven
/// from one timeline.
#[derive(Debug, Clone)]
pub struct FixedClock {
    millis: Arc<AtomicU64>,
    step: Arc<AtomicU64>,
}

impl FixedClock {
    /// Create a clock starting at `millis` that advances by 1ms per reading.
    pub fn new(millis: u64) -> Self {
        Self::with_step(millis, 1)
    }

    /// Create a clock starting at `millis` that advances by `step` per reading.
    pub fn with_step(millis: u64, step: u64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(millis)),
            step: Arc::new(AtomicU64::new(step)),
        }
    }

    /// Stop auto-advancing. Subsequent readings return the same value.
    pub fn freeze(&self) {
        self.step.store(0, Ordering::SeqCst);
    }

    /// Resume auto-advancing by `step` per reading.
    pub fn resume(&self, step: u64) {
        self.step.store(step, Ordering::SeqCst);
    }

    /// Advance the clock by the given number of milliseconds.
    pub fn advance(&self, ms: u64) {
        self.millis.fetch_add(ms, Ordering::SeqCst);
    }

    /// Set the clock to a specific time in milliseconds.
    pub fn set(&self, ms: u64) {
        self.millis.store(ms, Ordering::SeqCst);
    }

    /// Get the current time without advancing.
    pub fn get(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        let step = self.step.load(Ordering::SeqCst);
        self.millis.fetch_add(step, Ordering::SeqCst)
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        // 2024-01-01 00:00:00 UTC
        Self::new(1704067200000)
    }
}
