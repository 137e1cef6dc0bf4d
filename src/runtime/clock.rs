//! Time sources for diagnostic labels.
//!
//! The loop only reads time to stamp a creation time on each deferred value;
//! nothing is scheduled by time. Tests use [`VirtualClock`] so labels are
//! deterministic.

use std::cell::Cell;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Time source abstraction for the event loop.
pub trait TimeSource {
    /// Returns the current time as an offset from the source's epoch.
    fn now(&self) -> Duration;
}

/// Wall clock time source, measured from the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct WallClock;

impl WallClock {
    /// Creates a new wall clock time source.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TimeSource for WallClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// Virtual time source for tests.
///
/// Time only advances when explicitly told to do so.
///
/// ```
/// use settle::runtime::{TimeSource, VirtualClock};
/// use std::time::Duration;
///
/// let clock = VirtualClock::new();
/// assert_eq!(clock.now(), Duration::ZERO);
/// clock.advance(Duration::from_millis(1500));
/// assert_eq!(clock.now(), Duration::from_millis(1500));
/// ```
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: Cell<Duration>,
}

impl VirtualClock {
    /// Creates a virtual clock starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Cell::new(Duration::ZERO),
        }
    }

    /// Creates a virtual clock starting at the given time.
    #[must_use]
    pub const fn starting_at(time: Duration) -> Self {
        Self {
            now: Cell::new(time),
        }
    }

    /// Advances time by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get().saturating_add(delta));
    }

    /// Sets the current time.
    pub fn set(&self, time: Duration) {
        self.now.set(time);
    }
}

impl TimeSource for VirtualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_advances_only_on_request() {
        let clock = VirtualClock::starting_at(Duration::from_secs(5));
        assert_eq!(clock.now(), Duration::from_secs(5));
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), Duration::from_millis(5250));
        clock.set(Duration::ZERO);
        assert_eq!(clock.now(), Duration::ZERO);
    }

    #[test]
    fn wall_clock_is_after_epoch() {
        assert!(WallClock::new().now() > Duration::ZERO);
    }
}
