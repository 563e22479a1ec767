//! Bounded polling for instruments that have to be asked repeatedly whether a result is ready.

use std::time::{Duration, Instant};

/// Source of time for [poll_until]. Tests substitute a clock that only advances when slept on.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock with real sleeps.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause between two attempts.
    pub interval: Duration,
    /// Give up once this much time has passed since the first attempt.
    pub deadline: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            deadline: Duration::from_secs(5),
        }
    }
}

/// Call `attempt` until it yields a value.
///
/// Returns `Ok(None)` once `config.deadline` has elapsed without a value; errors from `attempt`
/// end the loop immediately. There are no retries beyond what the deadline allows.
pub fn poll_until<T, E>(
    clock: &impl Clock,
    config: &PollConfig,
    mut attempt: impl FnMut() -> Result<Option<T>, E>,
) -> Result<Option<T>, E> {
    let start = clock.now();
    loop {
        if clock.now().duration_since(start) > config.deadline {
            return Ok(None);
        }
        if let Some(value) = attempt()? {
            return Ok(Some(value));
        }
        clock.sleep(config.interval);
    }
}
