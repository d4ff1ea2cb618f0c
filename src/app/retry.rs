//! Fixed-delay retry that never gives up
//!
//! Refresh operations are idempotent, so a failed attempt is simply repeated
//! after a fixed delay until it succeeds. There is no attempt cap and no
//! backoff; the only way out besides success is a shutdown signal, which is
//! observed between attempts.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::constants::refresh::{DEFAULT_RETRY_DELAY, ESCALATE_AFTER_ATTEMPTS};
use crate::errors::{AppError, Result};

/// Runs an operation repeatedly on a fixed delay until it succeeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryScheduler {
    delay: Duration,
}

impl RetryScheduler {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op` until it returns `Ok`
    pub async fn retry_forever<T, F, Fut>(&self, label: &str, mut op: F) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match op().await {
                Ok(value) => {
                    log_success(label, attempt);
                    return value;
                }
                Err(e) => self.log_failure(label, attempt, &e),
            }

            tokio::time::sleep(self.delay).await;
        }
    }

    /// Run `op` until it returns `Ok` or `shutdown` fires
    ///
    /// Returns `None` when cancelled. An attempt already in progress is
    /// allowed to finish; cancellation happens while waiting for the next one.
    pub async fn retry_until_shutdown<T, F, Fut>(
        &self,
        label: &str,
        mut op: F,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match op().await {
                Ok(value) => {
                    log_success(label, attempt);
                    return Some(value);
                }
                Err(e) => self.log_failure(label, attempt, &e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = shutdown.recv() => {
                    info!("{} cancelled by shutdown after {} attempts", label, attempt);
                    return None;
                }
            }
        }
    }

    fn log_failure(&self, label: &str, attempt: u32, e: &AppError) {
        if attempt > ESCALATE_AFTER_ATTEMPTS {
            error!(
                "{} still failing after {} attempts ({} error: {}), retrying in {:?}",
                label,
                attempt,
                e.category(),
                e,
                self.delay
            );
        } else {
            warn!(
                "{} attempt {} failed ({} error: {}), retrying in {:?}",
                label,
                attempt,
                e.category(),
                e,
                self.delay
            );
        }
    }
}

fn log_success(label: &str, attempt: u32) {
    if attempt > 1 {
        info!("{} succeeded after {} attempts", label, attempt);
    }
}

impl Default for RetryScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAY)
    }
}
