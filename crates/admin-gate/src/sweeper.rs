use std::sync::Arc;
use std::time::Duration;

use admin_auth::RateLimiter;
use async_trait::async_trait;
use pingora::services::background::BackgroundService;

/// Periodically drops expired rate-limit entries so idle clients do not
/// accumulate between capacity evictions.
pub struct RateLimitSweeper {
    limiters: Vec<Arc<RateLimiter>>,
    interval: Duration,
}

impl RateLimitSweeper {
    pub fn new(limiters: Vec<Arc<RateLimiter>>, interval: Duration) -> Self {
        Self { limiters, interval }
    }

    /// One pass over every limiter. Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        self.limiters.iter().map(|l| l.purge_expired()).sum()
    }
}

#[async_trait]
impl BackgroundService for RateLimitSweeper {
    async fn start(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            let purged = self.sweep();
            if purged > 0 {
                log::debug!("Purged {} expired rate limit entries", purged);
            }
        }
    }
}
