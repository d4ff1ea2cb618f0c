//! Core application logic for the catchment cache
//!
//! This module contains the key-value store adapters, the upstream provider
//! client, the cache-aside resolver, the catchment aggregator and the
//! expiration-driven refresh coordinator.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use catchment_cache::app::{
//!     CacheAsideResolver, CatchmentAggregator, HttpDataProvider, InMemoryStore, ProviderConfig,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryStore::new());
//! let provider = Arc::new(HttpDataProvider::new(&ProviderConfig::default())?);
//! let resolver = CacheAsideResolver::new(store, Duration::from_secs(43_200));
//! let aggregator = CatchmentAggregator::new(resolver, provider);
//!
//! if let Some(collection) = aggregator.get_catchment_data("42", false).await? {
//!     println!("{} stations with upcoming data", collection.features.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod coordinator;
pub mod keys;
pub mod models;
pub mod provider;
pub mod resolver;
pub mod retry;
pub mod store;

// Re-export main public API
pub use aggregator::{aggregate, CatchmentAggregator};
pub use coordinator::{
    create_shutdown_channel, wait_for_shutdown_signal, RefreshConfig, RefreshCoordinator,
    RefreshHandle, RefreshStats, SignalHandler,
};
pub use keys::{station_path, CacheKey, EntityKind};
pub use models::{Feature, FeatureCollection, StationTimeSeries, TimeSeriesPoint};
pub use provider::{
    ConfigSelector, DataProvider, HttpDataProvider, ProviderConfig, SelectorTemplate,
};
pub use resolver::{CacheAsideResolver, CacheValue};
pub use retry::RetryScheduler;
pub use store::{
    ExpirationEvent, ExpirationNotifier, ExpirationStream, InMemoryStore, KeyValueStore,
    RedisExpirationNotifier, RedisStore, StoreConfig, StoreStats,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Ensure public API is accessible
        let config = StoreConfig::default();
        assert_eq!(config.key_namespace, "mike");
        assert_eq!(
            CacheKey::catchment_data("mike", "42").as_string(),
            "mike:catchmentdata:42"
        );
    }
}
