//! Software watchdog countdown.
//!
//! Stands in for the MCU watchdog peripheral on the host: instead of
//! resetting the processor, `check` reports starvation so a simulation can
//! model the reset.

use embassy_time::{Duration, Instant};

use super::{Clock, Watchdog};

/// The countdown expired while armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogStarved {
    /// Time since the last feed when starvation was detected.
    pub overdue: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    timeout: Duration,
    last_feed: Instant,
}

/// Watchdog driven by a [`Clock`].
#[derive(Debug)]
pub struct SoftWatchdog<C> {
    clock: C,
    armed: Option<Armed>,
    feeds: u32,
}

impl<C: Clock> SoftWatchdog<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            armed: None,
            feeds: 0,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Number of feeds since construction.
    pub fn feeds(&self) -> u32 {
        self.feeds
    }

    /// Err if armed and the last feed is at least one timeout old.
    pub fn check(&self) -> Result<(), WatchdogStarved> {
        let Some(armed) = self.armed else {
            return Ok(());
        };
        let elapsed = self.clock.now().saturating_duration_since(armed.last_feed);
        if elapsed >= armed.timeout {
            tracing::error!(
                elapsed_ms = elapsed.as_millis(),
                "watchdog starved, reset would trigger"
            );
            Err(WatchdogStarved { overdue: elapsed })
        } else {
            Ok(())
        }
    }
}

impl<C: Clock> Watchdog for SoftWatchdog<C> {
    fn arm(
        &mut self,
        timeout: Duration,
    ) {
        self.armed = Some(Armed {
            timeout,
            last_feed: self.clock.now(),
        });
    }

    fn disarm(&mut self) {
        self.armed = None;
    }

    fn feed(&mut self) {
        if let Some(armed) = self.armed.as_mut() {
            armed.last_feed = self.clock.now();
            self.feeds = self.feeds.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct TestClock(Cell<u64>);

    impl TestClock {
        fn advance_ms(
            &self,
            ms: u64,
        ) {
            self.0.set(self.0.get() + ms * 1000);
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            Instant::from_micros(self.0.get())
        }
    }

    #[test]
    fn disarmed_never_starves() {
        let clock = TestClock(Cell::new(0));
        let wd = SoftWatchdog::new(&clock);
        clock.advance_ms(10_000);
        assert!(wd.check().is_ok());
    }

    #[test]
    fn starves_at_timeout() {
        let clock = TestClock(Cell::new(0));
        let mut wd = SoftWatchdog::new(&clock);
        wd.arm(Duration::from_millis(250));
        clock.advance_ms(249);
        assert!(wd.check().is_ok());
        clock.advance_ms(1);
        assert_eq!(
            wd.check(),
            Err(WatchdogStarved {
                overdue: Duration::from_millis(250)
            })
        );
    }

    #[test]
    fn feeding_restarts_countdown() {
        let clock = TestClock(Cell::new(0));
        let mut wd = SoftWatchdog::new(&clock);
        wd.arm(Duration::from_millis(250));
        for _ in 0..10 {
            clock.advance_ms(200);
            assert!(wd.check().is_ok());
            wd.feed();
        }
        assert_eq!(wd.feeds(), 10);
    }

    #[test]
    fn feed_while_disarmed_is_ignored() {
        let clock = TestClock(Cell::new(0));
        let mut wd = SoftWatchdog::new(&clock);
        wd.feed();
        assert_eq!(wd.feeds(), 0);
        assert!(!wd.is_armed());
    }
}
