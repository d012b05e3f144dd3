//! Time source abstraction.
//!
//! The store anchors the entire dataset at a "now" captured once during
//! construction, and timestamps mutations as they happen. Tests substitute a
//! simulated source so generation and mutation timestamps are deterministic.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Source of the current wall-clock time.
pub trait TimeSource: Send + Sync {
    /// Current time. Millisecond precision is the finest anything here uses.
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A simulated time source for deterministic testing.
///
/// Time only moves when told to, so a store built against this source
/// produces identical data on every construction.
#[derive(Debug)]
pub struct SimulatedTimeSource {
    /// Current simulated time in milliseconds since the Unix epoch.
    current_ms: AtomicI64,
}

impl SimulatedTimeSource {
    #[must_use]
    pub const fn new(initial_ms: i64) -> Self {
        Self {
            current_ms: AtomicI64::new(initial_ms),
        }
    }

    /// Create a source fixed at the given instant.
    #[must_use]
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self::new(instant.timestamp_millis())
    }

    /// Advance time by the given number of milliseconds.
    pub fn advance(&self, ms: i64) {
        self.current_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Set the current time to a specific value.
    pub fn set(&self, ms: i64) {
        self.current_ms.store(ms, Ordering::SeqCst);
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        ms_to_datetime(self.current_ms.load(Ordering::SeqCst))
    }
}

fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    // Total for any millisecond value the tests produce; fall back to the
    // epoch rather than panicking on a nonsense value.
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

/// `instant + minutes`, at millisecond precision.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn add_minutes(instant: DateTime<Utc>, minutes: f64) -> DateTime<Utc> {
    add_ms(instant, (minutes * 60_000.0) as i64)
}

/// `instant + hours`, at millisecond precision.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn add_hours(instant: DateTime<Utc>, hours: f64) -> DateTime<Utc> {
    add_ms(instant, (hours * 3_600_000.0) as i64)
}

/// `instant + ms`.
#[must_use]
pub fn add_ms(instant: DateTime<Utc>, ms: i64) -> DateTime<Utc> {
    instant + Duration::milliseconds(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_time_fixed() {
        let time = SimulatedTimeSource::new(1000);
        assert_eq!(time.now().timestamp_millis(), 1000);
        assert_eq!(time.now().timestamp_millis(), 1000);
    }

    #[test]
    fn test_simulated_time_advance_and_set() {
        let time = SimulatedTimeSource::new(1000);
        time.advance(250);
        assert_eq!(time.now().timestamp_millis(), 1250);
        time.set(5000);
        assert_eq!(time.now().timestamp_millis(), 5000);
    }

    #[test]
    fn test_add_helpers() {
        let t = ms_to_datetime(0);
        assert_eq!(add_minutes(t, 1.5).timestamp_millis(), 90_000);
        assert_eq!(add_hours(t, -2.0).timestamp_millis(), -7_200_000);
        assert_eq!(add_ms(t, 42).timestamp_millis(), 42);
    }
}
