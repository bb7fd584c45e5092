//! Sliding-window rate limiter for the embedding API.
//!
//! Keeps an ordered history of `(timestamp, count)` tuples behind a single
//! mutex. `acquire` computes its verdict and any wait duration under the
//! lock, then sleeps outside it, so waiters never block other callers.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct RateLimiterStats {
    pub max_requests: usize,
    pub window: Duration,
    pub current_usage: usize,
    pub available: usize,
    pub entries_in_window: usize,
}

pub struct SlidingWindowRateLimiter {
    max_requests: usize,
    window: Duration,
    history: Mutex<VecDeque<(Instant, usize)>>,
}

impl SlidingWindowRateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            history: Mutex::new(VecDeque::new()),
        }
    }

    fn prune(history: &mut VecDeque<(Instant, usize)>, window: Duration, now: Instant) {
        while let Some((ts, _)) = history.front() {
            if now.duration_since(*ts) > window {
                history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Remaining slots in the current window.
    pub fn available_capacity(&self) -> usize {
        let mut history = self.history.lock();
        Self::prune(&mut history, self.window, Instant::now());
        let used: usize = history.iter().map(|(_, count)| count).sum();
        self.max_requests.saturating_sub(used)
    }

    /// Record usage without blocking (for requests already in flight).
    pub fn record(&self, count: usize) {
        self.history.lock().push_back((Instant::now(), count));
    }

    /// Block until `count` slots are free in the current window, record the
    /// usage and return `true`; return `false` once `timeout` elapses.
    pub async fn acquire(&self, count: usize, timeout: Duration) -> bool {
        let start = Instant::now();

        loop {
            let wait = {
                let mut history = self.history.lock();
                let now = Instant::now();
                Self::prune(&mut history, self.window, now);
                let used: usize = history.iter().map(|(_, c)| c).sum();

                if used + count <= self.max_requests {
                    history.push_back((now, count));
                    debug!(
                        acquired = count,
                        used = used + count,
                        max = self.max_requests,
                        "rate limiter slots acquired"
                    );
                    return true;
                }

                // Sleep until the oldest entry leaves the window.
                match history.front() {
                    Some((oldest, _)) => {
                        (*oldest + self.window).saturating_duration_since(now)
                            + Duration::from_millis(100)
                    }
                    None => Duration::from_millis(100),
                }
            };

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                warn!(count, "rate limiter acquire timed out");
                return false;
            }

            let remaining = timeout - elapsed;
            tokio::time::sleep(wait.min(remaining)).await;
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        let mut history = self.history.lock();
        Self::prune(&mut history, self.window, Instant::now());
        let used: usize = history.iter().map(|(_, count)| count).sum();
        RateLimiterStats {
            max_requests: self.max_requests,
            window: self.window,
            current_usage: used,
            available: self.max_requests.saturating_sub(used),
            entries_in_window: history.len(),
        }
    }
}
