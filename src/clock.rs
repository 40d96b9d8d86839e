//! Time source abstraction.
//!
//! Two readings are exposed. Wall-clock time stamps records that outlive the
//! process (media expiry) and drives idle eviction. Monotonic time measures
//! intervals such as the anti-bounce window, and is immune to clock steps.

use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Monotonic time, for measuring elapsed intervals.
    fn instant(&self) -> Instant;
}

/// The system clock.
///
/// Monotonic readings come from tokio, so paused-time tests control them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
struct ManualTime {
    wall: DateTime<Utc>,
    elapsed: Duration,
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    time: RwLock<ManualTime>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            time: RwLock::new(ManualTime {
                wall: start,
                elapsed: Duration::ZERO,
            }),
        }
    }

    /// Start at the current system time.
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Let time pass. Both readings move forward by `by`; negative values
    /// are ignored.
    pub fn advance(&self, by: TimeDelta) {
        let Ok(by) = by.to_std() else {
            return;
        };
        if let Ok(mut time) = self.time.write() {
            time.wall += TimeDelta::from_std(by).unwrap_or(TimeDelta::zero());
            time.elapsed += by;
        }
    }

    /// Step the wall clock to `to`, as an NTP correction would. Monotonic
    /// time is unaffected.
    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut time) = self.time.write() {
            time.wall = to;
        }
    }

    fn read<T>(&self, f: impl FnOnce(&ManualTime) -> T) -> T {
        match self.time.read() {
            Ok(time) => f(&time),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.read(|time| time.wall)
    }

    fn instant(&self) -> Instant {
        self.origin + self.read(|time| time.elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::starting_now();
        let start = clock.now();
        let started = clock.instant();

        clock.advance(TimeDelta::seconds(7));
        assert_eq!(clock.now() - start, TimeDelta::seconds(7));
        assert_eq!(clock.instant() - started, Duration::from_secs(7));
    }

    #[test]
    fn test_manual_clock_ignores_negative_advance() {
        let clock = ManualClock::starting_now();
        let start = clock.now();
        let started = clock.instant();

        clock.advance(TimeDelta::seconds(-5));
        assert_eq!(clock.now(), start);
        assert_eq!(clock.instant(), started);
    }

    #[test]
    fn test_wall_step_leaves_monotonic_time() {
        let clock = ManualClock::starting_now();
        let started = clock.instant();

        clock.set(DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(clock.now(), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(clock.instant(), started);
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_clock_follows_paused_time() {
        let started = SystemClock.instant();
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(SystemClock.instant() - started >= Duration::from_secs(6));
    }
}
