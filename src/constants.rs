//! Application constants for the catchment cache
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names read by the configuration loader
pub mod env {
    /// Redis connection target (URL or bare port)
    pub const REDIS_URL: &str = "REDIS_URL";

    /// Logical Redis database index
    pub const REDIS_DB_NO: &str = "REDIS_DB_NO";

    /// Default cache TTL in seconds
    pub const CACHE_TTL: &str = "CACHE_TTL";

    /// Base URL of the upstream data provider
    pub const PROVIDER_URL: &str = "MIKE_API_URL";
}

/// Cache key layout and store defaults
pub mod store {
    use super::Duration;

    /// Namespace prefix shared by every cache key
    pub const KEY_NAMESPACE: &str = "mike";

    /// Separator between key segments
    pub const KEY_SEPARATOR: char = ':';

    /// Separator used to join multiple ids into one key segment
    pub const ID_LIST_SEPARATOR: &str = "$";

    /// Default Redis connection target
    pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

    /// Host used when REDIS_URL only carries a port
    pub const DEFAULT_REDIS_HOST: &str = "127.0.0.1";

    /// Default logical database index
    pub const DEFAULT_DB_INDEX: u32 = 2;

    /// Default time-to-live of cached entries (12 hours)
    pub const DEFAULT_TTL_SECS: u64 = 12 * 60 * 60;

    /// Default time-to-live as a Duration
    pub const DEFAULT_TTL: Duration = Duration::from_secs(DEFAULT_TTL_SECS);

    /// Keyspace event flags enabling expiry notifications
    pub const KEYSPACE_EVENTS_EXPIRED: &str = "Ex";

    /// Event type carried by expiry notifications
    pub const EXPIRED_EVENT: &str = "expired";

    /// Capacity of the in-memory expiration broadcast channel
    pub const MEMORY_EVENT_CAPACITY: usize = 1024;

    /// Pub/sub channel carrying expired-key events for one database
    pub fn expired_channel(db: u32) -> String {
        format!("__keyevent@{}__:{}", db, EXPIRED_EVENT)
    }
}

/// Upstream provider endpoints and selector template
pub mod provider {
    use super::Duration;

    /// Default provider base URL
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/";

    /// Timestep connection path
    pub const TIMESTEP_PATH: &str = "timestep/mo-timestep";

    /// Feature collection listing endpoint
    pub const FEATURE_LIST_PATH: &str = "featurecollection/mo-gis/list";

    /// Time-series listing endpoint
    pub const TIMESERIES_LIST_PATH: &str = "timeseries/mo-timeseries/list";

    /// Collection kind listing all catchment ids
    pub const CATCHMENT_ITEMS_KIND: &str = "items";

    /// Selector type for catchment detail requests
    pub const FEATURE_TYPE_INFO: &str = "FeatureTypeInfo";

    /// Default reference date passed with catchment detail requests
    pub const DEFAULT_DETAILS_AS_OF: &str = "2000-01-01T000000";

    /// Selector template defaults
    pub const DEFAULT_CONFIGURATION_NAME: &str = "Water Monitoring";
    pub const DEFAULT_THEME_ID: &str = "";
    pub const DEFAULT_OBSERVATION_PERIOD: &str = "OBS1";
    pub const DEFAULT_OBSERVATION_PERIOD_OFFSET: &str = "";

    /// Default user agent for provider requests
    pub const USER_AGENT: &str = "catchment-cache/0.1.0";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 25;
}

/// Refresh coordination
pub mod refresh {
    use super::Duration;

    /// Fixed delay between refresh retry attempts
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(5000);

    /// Capacity of the refresh work queue
    pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

    /// Maximum time to wait for refresh tasks on shutdown
    pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

    /// Failed attempts after which every further failure is logged at error level
    pub const ESCALATE_AFTER_ATTEMPTS: u32 = 10;
}

/// Logging and debugging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

// Re-export commonly used constants for convenience
pub use provider::USER_AGENT;
pub use refresh::DEFAULT_RETRY_DELAY;
pub use store::{DEFAULT_DB_INDEX, DEFAULT_TTL_SECS, KEY_NAMESPACE};
