//! Two-tier sliding-window rate limiter
//!
//! Heavy endpoints get 1 request/second, standard endpoints 20. Each
//! class tracks its recent request instants in a window pruned to a
//! one-second horizon; at capacity a caller sleeps until the oldest
//! instant ages out.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::provider::RateClass;

const WINDOW: Duration = Duration::from_secs(1);

/// Per-class sliding windows, mutex-guarded for concurrent callers
pub struct SlidingWindowLimiter {
    heavy: Mutex<VecDeque<Instant>>,
    standard: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new() -> Self {
        Self {
            heavy: Mutex::new(VecDeque::new()),
            standard: Mutex::new(VecDeque::new()),
        }
    }

    fn window(&self, class: RateClass) -> &Mutex<VecDeque<Instant>> {
        match class {
            RateClass::Heavy => &self.heavy,
            RateClass::Standard => &self.standard,
        }
    }

    /// Block until the class has budget, then record this request
    pub async fn acquire(&self, class: RateClass) {
        let cap = class.requests_per_second();

        loop {
            let wait = {
                let mut window = self.window(class).lock().await;
                let now = Instant::now();

                while window.front().map(|&t| now - t >= WINDOW).unwrap_or(false) {
                    window.pop_front();
                }

                if window.len() < cap {
                    window.push_back(now);
                    return;
                }

                // Sleep outside the lock so other classes proceed
                WINDOW - (now - *window.front().expect("window at capacity"))
            };

            sleep(wait).await;
        }
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new()
    }
}
