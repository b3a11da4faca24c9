use std::thread;
use std::time::{Duration, Instant};

/// Time source for the lever sweep.
///
/// The sweep waits `step_delay` between simulator moves through `sleep`, so a
/// fake clock runs a whole sweep without wall-clock waits.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            thread::sleep(d);
        }
    }
}

#[cfg(any(test, feature = "test-clock"))]
pub mod test_clock {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Clock that only moves when slept on. Clones share one timeline, so a
    /// test keeps a clone to read how long a session waited.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        slept: Arc<Mutex<Duration>>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                slept: Arc::new(Mutex::new(Duration::ZERO)),
            }
        }

        /// Total time slept across all clones.
        pub fn elapsed(&self) -> Duration {
            self.slept.lock().map(|g| *g).unwrap_or(Duration::ZERO)
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.origin + self.elapsed()
        }

        fn sleep(&self, d: Duration) {
            if let Ok(mut slept) = self.slept.lock() {
                *slept = slept.saturating_add(d);
            }
        }
    }
}
