//! Time values and clocks
//!
//! Services never read the wall clock directly. They hold a [`Clock`] and
//! ask it for the current [`Instant`]; production code installs a
//! [`SystemClock`], tests install a [`ManualClock`] and move it by hand.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::ops::{Add, Sub};
use std::rc::Rc;

/// A point on the runtime's monotonic timeline, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Instant(u64);

impl Instant {
    /// The origin of the timeline
    pub const ZERO: Instant = Instant(0);

    /// Creates an instant at `millis` past the origin
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds past the origin
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`, zero if `earlier` is later
    pub fn saturating_since(&self, earlier: Instant) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant(self.0.saturating_add(rhs.0))
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Instant {
        Instant(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t+{}ms", self.0)
    }
}

/// A span of time, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Duration(u64);

impl Duration {
    /// The empty span
    pub const ZERO: Duration = Duration(0);

    /// Creates a duration from milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Creates a duration from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000))
    }

    /// Whole milliseconds in this span
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Converts to a standard library duration
    pub fn to_std(self) -> std::time::Duration {
        std::time::Duration::from_millis(self.0)
    }
}

impl From<std::time::Duration> for Duration {
    fn from(d: std::time::Duration) -> Self {
        Self(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Duration {
        Duration(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Source of the current instant
pub trait Clock {
    /// Returns the current instant
    fn now(&self) -> Instant;
}

/// Clock backed by the host's monotonic clock
///
/// The origin is the moment the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: std::time::Instant,
}

impl SystemClock {
    /// Creates a clock whose origin is now
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::from_millis(Duration::from(self.origin.elapsed()).as_millis())
    }
}

/// Clock that only moves when told to
///
/// Clones share the same timeline, so a test can keep one clone and hand
/// another to the service under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    /// Creates a clock at the origin
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Jumps to an absolute instant
    pub fn set(&self, to: Instant) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_arithmetic_saturates() {
        let t = Instant::from_millis(100);
        assert_eq!(t + Duration::from_millis(50), Instant::from_millis(150));
        assert_eq!(t - Duration::from_millis(500), Instant::ZERO);
        assert_eq!(t.saturating_since(Instant::from_millis(400)), Duration::ZERO);
        assert_eq!(
            Instant::from_millis(400).saturating_since(t),
            Duration::from_millis(300)
        );
    }

    #[test]
    fn test_duration_conversions() {
        assert_eq!(Duration::from_secs(2), Duration::from_millis(2_000));
        assert_eq!(
            Duration::from(std::time::Duration::from_micros(1_500)),
            Duration::from_millis(1)
        );
        assert_eq!(Duration::from_millis(7).to_std().as_millis(), 7);
        assert_eq!(Duration::from_millis(7).to_string(), "7ms");
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let view = clock.clone();
        assert_eq!(view.now(), Instant::ZERO);

        clock.advance(Duration::from_millis(149));
        assert_eq!(view.now(), Instant::from_millis(149));

        clock.set(Instant::from_millis(10));
        assert_eq!(view.now(), Instant::from_millis(10));
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
