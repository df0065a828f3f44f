//! Time source used by the reconnect loop and the DFU device wait.
//!
//! Both loops poll something external and sleep in between. Routing the
//! sleep and the deadline through [`Clock`] lets tests run thousands of
//! iterations against simulated time.

use std::time::{Duration, Instant};

/// A monotonic clock that can also block the current thread.
pub trait Clock {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by [`Instant::now`] and [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::Clock;
    use std::cell::Cell;
    use std::time::{Duration, Instant};

    /// Simulated clock: `sleep` advances time instantly.
    pub(crate) struct MockClock {
        start: Instant,
        elapsed: Cell<Duration>,
        sleeps: Cell<usize>,
    }

    impl MockClock {
        pub(crate) fn new() -> Self {
            Self {
                start: Instant::now(),
                elapsed: Cell::new(Duration::ZERO),
                sleeps: Cell::new(0),
            }
        }

        pub(crate) fn advance(&self, by: Duration) {
            self.elapsed.set(self.elapsed.get() + by);
        }

        pub(crate) fn elapsed(&self) -> Duration {
            self.elapsed.get()
        }

        pub(crate) fn sleeps(&self) -> usize {
            self.sleeps.get()
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> Instant {
            self.start + self.elapsed.get()
        }

        fn sleep(&self, duration: Duration) {
            self.sleeps.set(self.sleeps.get() + 1);
            self.advance(duration);
        }
    }
}
