//! Bounded retries for work that may succeed a moment later.
//!
//! Remote offset downloads back off with growing delays. Replay discovery
//! polls the replay folder at a steady pace while the client finishes
//! writing the `.osr` file.

use std::thread;
use std::time::Duration;

use tracing::trace;

use crate::config::retry as retry_config;

pub trait RetryStrategy {
    /// Total attempts including the first one.
    fn max_attempts(&self) -> u32;

    /// Pause after attempt `attempt` (0-based) failed.
    fn delay_for_attempt(&self, attempt: u32) -> Option<Duration>;

    /// Run `op` until it succeeds or attempts run out, returning the last error.
    /// `op` receives the 0-based attempt number and always runs at least once.
    fn execute<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
    {
        let last = self.max_attempts().max(1) - 1;
        for attempt in 0..last {
            if let Ok(value) = op(attempt) {
                return Ok(value);
            }
            let pause = self.delay_for_attempt(attempt);
            trace!(attempt, ?pause, "Attempt failed, retrying");
            if let Some(pause) = pause {
                thread::sleep(pause);
            }
        }
        op(last)
    }
}

/// Growing delays taken from `config::retry`, used for offset downloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExponentialBackoff;

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn max_attempts(&self) -> u32 {
        retry_config::MAX_FETCH_ATTEMPTS
    }

    fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        let ms = retry_config::RETRY_DELAYS_MS.get(attempt as usize)?;
        Some(Duration::from_millis(*ms))
    }
}

/// Same pause between every attempt.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    attempts: u32,
    pause: Duration,
}

impl FixedDelay {
    pub fn new(attempts: u32, pause: Duration) -> Self {
        Self { attempts, pause }
    }
}

impl RetryStrategy for FixedDelay {
    fn max_attempts(&self) -> u32 {
        self.attempts
    }

    fn delay_for_attempt(&self, _attempt: u32) -> Option<Duration> {
        Some(self.pause)
    }
}
