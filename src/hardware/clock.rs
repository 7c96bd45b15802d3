//! Monotonic tick source.
//!
//! Every interval the rig measures (debounce windows, settle delays,
//! frame pacing, elapsed-time logging) goes through a [`Clock`] so that
//! tests can substitute virtual time.

use chrono::{Local, NaiveDateTime};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Source of monotonic ticks, wall-clock timestamps and delays.
pub trait Clock: Send + Sync {
    /// Monotonic time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Current local wall-clock time.
    fn wall(&self) -> NaiveDateTime;

    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Clock backed by [`Instant`] and the local system time.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wall(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Virtual clock for tests and simulation.
///
/// Time only moves through [`ManualClock::advance`] or [`Clock::sleep`],
/// which returns immediately after advancing.
#[derive(Debug)]
pub struct ManualClock {
    elapsed_nanos: AtomicU64,
    wall_origin: NaiveDateTime,
}

impl ManualClock {
    /// Creates a clock whose wall time starts at `wall_origin`.
    pub fn new(wall_origin: NaiveDateTime) -> Self {
        Self {
            elapsed_nanos: AtomicU64::new(0),
            wall_origin,
        }
    }

    /// Moves virtual time forward.
    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(NaiveDateTime::default())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }

    fn wall(&self) -> NaiveDateTime {
        let elapsed =
            chrono::Duration::from_std(self.now()).unwrap_or_else(|_| chrono::Duration::zero());
        self.wall_origin + elapsed
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_manual_clock_sleep_advances() {
        let clock = ManualClock::default();
        assert_eq!(clock.now(), Duration::ZERO);

        clock.sleep(Duration::from_millis(250));
        clock.advance(Duration::from_millis(750));
        assert_eq!(clock.now(), Duration::from_secs(1));
    }

    #[test]
    fn test_manual_clock_wall_follows_ticks() {
        let origin = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 3)
            .unwrap();
        let clock = ManualClock::new(origin);
        clock.advance(Duration::from_secs(2));

        assert_eq!(clock.wall(), origin + chrono::Duration::seconds(2));
    }

    #[test]
    fn test_monotonic_clock_is_monotonic() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
