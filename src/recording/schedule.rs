//! Time sources and periodic schedules
//!
//! Scenarios never sleep. A host calls `poll` repeatedly and each [`Timer`]
//! decides whether its interval has elapsed on the injected [`Clock`]. Tests
//! drive a [`ManualClock`] forward instead of waiting.

use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Source of monotonic and wall-clock time
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Monotonic instant used for scheduling
    fn now(&self) -> Instant;

    /// Wall-clock time used for row timestamps and file names
    fn wall_time(&self) -> DateTime<Local>;
}

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock>;

/// The real clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_time(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base_instant: Instant,
    base_wall: DateTime<Local>,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Start at the current wall time
    pub fn new() -> Self {
        Self::starting_at(Local::now())
    }

    /// Start at a fixed wall time
    pub fn starting_at(wall: DateTime<Local>) -> Self {
        Self {
            base_instant: Instant::now(),
            base_wall: wall,
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }

    /// Total time advanced so far
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base_instant + self.elapsed()
    }

    fn wall_time(&self) -> DateTime<Local> {
        let offset = chrono::Duration::from_std(self.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.base_wall + offset
    }
}

/// Fixed-interval schedule
///
/// The first firing happens one interval after creation. When a poll comes
/// late, missed firings are skipped rather than replayed.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    interval: Duration,
    next_due: Instant,
}

impl Timer {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_due: now + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    /// Consume one firing if due
    pub fn fire(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        if self.interval.is_zero() {
            self.next_due = now;
            return true;
        }
        while self.next_due <= now {
            self.next_due += self.interval;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        let w0 = clock.wall_time();
        clock.advance(Duration::from_millis(1500));

        assert_eq!(clock.now() - t0, Duration::from_millis(1500));
        assert_eq!((clock.wall_time() - w0).num_milliseconds(), 1500);
    }

    #[test]
    fn test_timer_first_fire_after_one_interval() {
        let clock = ManualClock::new();
        let mut timer = Timer::new(Duration::from_millis(100), clock.now());

        assert!(!timer.fire(clock.now()));
        clock.advance(Duration::from_millis(99));
        assert!(!timer.fire(clock.now()));
        clock.advance(Duration::from_millis(1));
        assert!(timer.fire(clock.now()));
        assert!(!timer.fire(clock.now()));
    }

    #[test]
    fn test_timer_skips_missed_ticks() {
        let clock = ManualClock::new();
        let start = clock.now();
        let mut timer = Timer::new(Duration::from_millis(100), start);

        clock.advance(Duration::from_millis(350));
        assert!(timer.fire(clock.now()));
        assert!(!timer.fire(clock.now()));
        assert_eq!(timer.next_due() - start, Duration::from_millis(400));
    }
}
