//! Global request spacing shared by every worker.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum delay between the starts of consecutive requests,
/// across all workers.
pub struct RateLimiter {
    min_delay: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_grant: Mutex::new(None),
        }
    }

    /// Wait until `min_delay` has passed since the previous grant.
    ///
    /// The lock is held across the sleep so waiters are released one at a
    /// time in the mutex's FIFO order.
    pub async fn acquire(&self) {
        let mut last = self.last_grant.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_delay;
            if Instant::now() < ready_at {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
