use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::{RATE_LIMIT_PER_5_MINUTES, RATE_LIMIT_PER_MINUTE};

/// Upper bound on sleep/re-check rounds in one `acquire` call. Each round
/// frees at least one window slot, so this is never reached in practice.
const MAX_RECHECKS: u32 = 64;

/// Blocking pacer for the price API's two sliding-window request ceilings.
///
/// `acquire` only waits; it records nothing. Callers append a timestamp via
/// `record` after the request actually succeeded.
pub struct RateLimiter {
    timestamps: VecDeque<Instant>,
    per_minute: usize,
    per_window: usize,
    minute: Duration,
    window: Duration,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(
            RATE_LIMIT_PER_MINUTE,
            RATE_LIMIT_PER_5_MINUTES,
            Duration::from_secs(60),
            Duration::from_secs(300),
        )
    }

    pub fn with_limits(
        per_minute: usize,
        per_window: usize,
        minute: Duration,
        window: Duration,
    ) -> Self {
        Self {
            timestamps: VecDeque::new(),
            per_minute,
            per_window,
            minute,
            window,
        }
    }

    /// Blocks until a request would stay under both ceilings. Both windows are
    /// re-evaluated after every sleep: the elapsed time may have expired more
    /// entries than the one we slept for.
    pub fn acquire(&mut self) {
        for _ in 0..MAX_RECHECKS {
            let now = Instant::now();
            self.prune(now);

            match self.required_wait(now) {
                Some(wait) => {
                    debug!("rate limit reached, sleeping {:?}", wait);
                    thread::sleep(wait);
                }
                None => return,
            }
        }
    }

    /// Marks a completed request. Callers invoke this only after success so
    /// failed attempts do not consume window slots.
    pub fn record(&mut self) {
        self.timestamps.push_back(Instant::now());
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.timestamps.front() {
            if now.duration_since(*front) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn required_wait(&self, now: Instant) -> Option<Duration> {
        if self.timestamps.len() >= self.per_window {
            let oldest = *self.timestamps.front()?;
            let elapsed = now.duration_since(oldest);
            if elapsed < self.window {
                return Some(self.window - elapsed);
            }
        }

        let in_minute = self
            .timestamps
            .iter()
            .filter(|ts| now.duration_since(**ts) < self.minute)
            .count();
        if in_minute >= self.per_minute {
            // Wait for the oldest of the newest `per_minute` entries to age out.
            let idx = self.timestamps.len() - self.per_minute;
            let ts = self.timestamps[idx];
            let elapsed = now.duration_since(ts);
            if elapsed < self.minute {
                return Some(self.minute - elapsed);
            }
        }

        None
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_the_ceiling_never_blocks() {
        let mut limiter =
            RateLimiter::with_limits(3, 10, Duration::from_secs(60), Duration::from_secs(300));

        // As many requests as the per-minute ceiling allows, no waiting.
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire();
            limiter.record();
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn minute_ceiling_blocks_until_a_slot_frees() {
        let minute = Duration::from_millis(150);
        let mut limiter = RateLimiter::with_limits(2, 10, minute, Duration::from_secs(300));

        limiter.record();
        limiter.record();

        let start = Instant::now();
        limiter.acquire();
        // Had to outwait the older of the two timestamps.
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn long_window_ceiling_blocks_too() {
        let window = Duration::from_millis(150);
        let mut limiter = RateLimiter::with_limits(10, 2, Duration::from_millis(10), window);

        limiter.record();
        limiter.record();

        let start = Instant::now();
        limiter.acquire();
        assert!(start.elapsed() >= Duration::from_millis(50));
        // The expired entries were pruned on the way out.
        assert!(limiter.timestamps.len() < 2);
    }
}
