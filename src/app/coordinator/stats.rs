//! Refresh statistics tracking

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters for expiration handling and refresh chains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStats {
    /// Expiration events read from the notifier
    pub events_received: u64,
    /// Events whose key named a catchment aggregate
    pub events_matched: u64,
    /// Refresh chains started
    pub refreshes_started: u64,
    /// Refresh chains that ended in a successful rebuild
    pub refreshes_completed: u64,
    /// Refresh chains stopped by shutdown before succeeding
    pub refreshes_cancelled: u64,
    /// Matched events dropped because the catchment was already refreshing
    pub coalesced: u64,
    /// Failed refresh attempts across all chains
    pub failed_attempts: u64,
    /// When the coordinator started
    pub started_at: DateTime<Utc>,
}

impl Default for RefreshStats {
    fn default() -> Self {
        Self {
            events_received: 0,
            events_matched: 0,
            refreshes_started: 0,
            refreshes_completed: 0,
            refreshes_cancelled: 0,
            coalesced: 0,
            failed_attempts: 0,
            started_at: Utc::now(),
        }
    }
}

impl RefreshStats {
    /// Chains started but not yet finished either way
    pub fn in_progress(&self) -> u64 {
        self.refreshes_started
            .saturating_sub(self.refreshes_completed + self.refreshes_cancelled)
    }

    /// Time since the coordinator started
    pub fn uptime(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// One-line summary for logging
    pub fn summary(&self) -> String {
        format!(
            "{} events ({} matched), {} refreshes started, {} completed, {} cancelled, {} coalesced, {} failed attempts",
            self.events_received,
            self.events_matched,
            self.refreshes_started,
            self.refreshes_completed,
            self.refreshes_cancelled,
            self.coalesced,
            self.failed_attempts
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_progress() {
        let stats = RefreshStats {
            refreshes_started: 5,
            refreshes_completed: 3,
            refreshes_cancelled: 1,
            ..Default::default()
        };
        assert_eq!(stats.in_progress(), 1);
    }

    #[test]
    fn test_summary_mentions_counters() {
        let stats = RefreshStats {
            events_received: 4,
            coalesced: 2,
            ..Default::default()
        };
        let summary = stats.summary();
        assert!(summary.contains("4 events"));
        assert!(summary.contains("2 coalesced"));
    }
}
