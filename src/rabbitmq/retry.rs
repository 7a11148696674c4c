use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, warn};

/// Fixed-interval retry used as a startup readiness gate.
///
/// The default policy retries forever, waiting the same interval between
/// attempts. `with_max_attempts` bounds it, in which case the last error is
/// returned once the cap is hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    interval: Duration,
    max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Self::DEFAULT_INTERVAL)
    }
}

impl RetryPolicy {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Runs `operation` until it succeeds. The closure receives the 1-based
    /// attempt number.
    pub async fn retry<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if self.max_attempts.is_some_and(|max| attempt >= max) {
                        error!(
                            attempt,
                            "Max connection attempts reached. Giving up: {}",
                            err
                        );
                        return Err(err);
                    }

                    warn!(
                        attempt,
                        "Waiting for RabbitMQ... retrying in {:?}: {}",
                        self.interval,
                        err
                    );
                    sleep(self.interval).await;
                    attempt += 1;
                }
            }
        }
    }
}
