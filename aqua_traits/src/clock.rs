use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Time source for schedule projection and retry pacing.
///
/// - now(): monotonic Instant for intervals
/// - unix_secs(): wall-clock seconds, comparable with device timestamps
/// - sleep(): waits for the provided duration (implementations may simulate)
pub trait Clock {
    fn now(&self) -> Instant;
    fn unix_secs(&self) -> i64;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        u64::try_from(dur.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Real clock backed by `Instant` and `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_secs(&self) -> i64 {
        // A clock set before 1970 reads as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

#[cfg(any(test, feature = "test-clock"))]
pub mod test_clock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Deterministic clock whose time only moves when told to.
    ///
    /// now() = origin + offset, unix_secs() = unix_origin + offset
    /// sleep(d) advances internal time by d without actually sleeping.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        unix_origin: i64,
        offset: Arc<Mutex<Duration>>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::at_unix(0)
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self::default()
        }

        /// Start the wall clock at `unix` seconds.
        pub fn at_unix(unix: i64) -> Self {
            Self {
                origin: Instant::now(),
                unix_origin: unix,
                offset: Arc::new(Mutex::new(Duration::ZERO)),
            }
        }

        pub fn advance(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = off.saturating_add(d);
            }
        }

        /// Total time slept or advanced so far.
        pub fn elapsed(&self) -> Duration {
            self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.origin + self.elapsed()
        }

        fn unix_secs(&self) -> i64 {
            self.unix_origin
                .saturating_add(i64::try_from(self.elapsed().as_secs()).unwrap_or(i64::MAX))
        }

        fn sleep(&self, d: Duration) {
            self.advance(d);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn sleep_advances_both_clocks() {
            let clock = TestClock::at_unix(1_000);
            let start = clock.now();
            clock.sleep(Duration::from_secs(90));
            assert_eq!(clock.unix_secs(), 1_090);
            assert_eq!(clock.ms_since(start), 90_000);
        }

        #[test]
        fn wall_clock_saturates_instead_of_wrapping() {
            let clock = TestClock::at_unix(i64::MAX - 10);
            clock.advance(Duration::from_secs(100));
            assert_eq!(clock.unix_secs(), i64::MAX);
            assert!(SystemClock.unix_secs() > 0);
        }
    }
}
