//! Prelude module for the catchment cache
//!
//! Re-exports the items most integrations need, so a single
//! `use catchment_cache::prelude::*;` is enough to wire up a store, a
//! provider, the resolver and the aggregator.
//!
//! # Usage
//!
//! ```rust,no_run
//! use catchment_cache::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let store = Arc::new(InMemoryStore::new());
//!     let provider = Arc::new(HttpDataProvider::new(&ProviderConfig::default())?);
//!     let resolver = CacheAsideResolver::new(store, StoreConfig::default().default_ttl);
//!     let aggregator = CatchmentAggregator::new(resolver, provider);
//!
//!     let ids = aggregator.list_catchment_ids().await?;
//!     println!("{}", ids);
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential app components that are used in most integrations
pub use crate::app::{
    // Caching
    CacheAsideResolver,
    CacheKey,
    CacheValue,
    // Aggregation and refresh
    CatchmentAggregator,
    DataProvider,
    EntityKind,
    ExpirationNotifier,
    // Data types
    FeatureCollection,
    HttpDataProvider,
    InMemoryStore,
    KeyValueStore,
    ProviderConfig,
    RedisExpirationNotifier,
    RedisStore,
    RefreshConfig,
    RefreshCoordinator,
    RefreshStats,
    StationTimeSeries,
    StoreConfig,
};

pub use crate::config::AppConfig;

// Commonly used constants
pub use crate::constants::{DEFAULT_DB_INDEX, DEFAULT_TTL_SECS, KEY_NAMESPACE};

// Standard library re-exports that are commonly needed
pub use std::sync::Arc;
pub use std::time::Duration;

pub use tokio;
