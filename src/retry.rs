//! Bounded retry with a pluggable clock
//!
//! The "file not there yet" window between an editor's unlink and its
//! recreate is tolerated with a fixed count-times-interval policy. The
//! sleep lives behind a trait so tests drive the policy with a fake clock.

use std::time::Duration;

/// Sleep abstraction so retry timing is testable
pub trait Clock {
    fn sleep(&self, duration: Duration);
}

/// Clock backed by `std::thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Bounded retry policy: up to `attempts` tries, `delay` between them
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds or the attempt budget is spent, sleeping
    /// between attempts but not after the last. Returns the final error on
    /// exhaustion. A zero-attempt policy still tries once.
    pub fn run<T, E>(
        &self,
        clock: &dyn Clock,
        mut op: impl FnMut() -> Result<T, E>,
    ) -> Result<T, E> {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= attempts {
                        return Err(err);
                    }
                    clock.sleep(self.delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeClock {
        sleeps: RefCell<Vec<Duration>>,
    }

    impl FakeClock {
        fn new() -> Self {
            Self { sleeps: RefCell::new(Vec::new()) }
        }
    }

    impl Clock for FakeClock {
        fn sleep(&self, duration: Duration) {
            self.sleeps.borrow_mut().push(duration);
        }
    }

    #[test]
    fn test_success_on_first_attempt_never_sleeps() {
        let clock = FakeClock::new();
        let policy = RetryPolicy { attempts: 5, delay: Duration::from_millis(10) };
        let result: Result<u32, ()> = policy.run(&clock, || Ok(7));
        assert_eq!(result, Ok(7));
        assert!(clock.sleeps.borrow().is_empty());
    }

    #[test]
    fn test_succeeds_after_transient_failures() {
        let clock = FakeClock::new();
        let policy = RetryPolicy { attempts: 5, delay: Duration::from_millis(10) };
        let mut calls = 0;
        let result: Result<u32, &str> = policy.run(&clock, || {
            calls += 1;
            if calls < 3 { Err("not yet") } else { Ok(calls) }
        });
        assert_eq!(result, Ok(3));
        assert_eq!(clock.sleeps.borrow().len(), 2);
    }

    #[test]
    fn test_exhaustion_returns_last_error_without_trailing_sleep() {
        let clock = FakeClock::new();
        let policy = RetryPolicy { attempts: 4, delay: Duration::from_millis(10) };
        let mut calls = 0;
        let result: Result<(), u32> = policy.run(&clock, || {
            calls += 1;
            Err(calls)
        });
        assert_eq!(result, Err(4));
        // one sleep between each pair of attempts, none after the last
        assert_eq!(clock.sleeps.borrow().len(), 3);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let clock = FakeClock::new();
        let policy = RetryPolicy { attempts: 0, delay: Duration::from_millis(10) };
        let mut calls = 0;
        let _: Result<(), ()> = policy.run(&clock, || {
            calls += 1;
            Err(())
        });
        assert_eq!(calls, 1);
    }
}
