//! Configuration for the refresh coordinator
//!
//! This module defines how refresh chains are retried, how much expiration
//! work may be queued, and how long shutdown waits for running tasks.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::refresh;

/// Configuration for the refresh coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Fixed delay between attempts of a failing refresh
    pub retry_delay: Duration,
    /// Capacity of the queue between the notification consumer and the dispatcher
    pub queue_capacity: usize,
    /// Maximum time to wait for tasks during shutdown
    pub shutdown_timeout: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            retry_delay: refresh::DEFAULT_RETRY_DELAY,
            queue_capacity: refresh::DEFAULT_QUEUE_CAPACITY,
            shutdown_timeout: refresh::DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl RefreshConfig {
    /// Set the retry delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the work queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set shutdown timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.retry_delay.is_zero() {
            return Err("Refresh retry delay cannot be zero".to_string());
        }

        if self.queue_capacity == 0 {
            return Err("Refresh queue capacity cannot be zero".to_string());
        }

        if self.shutdown_timeout.is_zero() {
            return Err("Shutdown timeout cannot be zero".to_string());
        }

        Ok(())
    }
}
