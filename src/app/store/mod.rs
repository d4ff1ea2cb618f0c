//! Key-value store and expiration notification abstractions
//!
//! The cache layer needs two capabilities from its backend: TTL-aware
//! get/set of serialized payloads, and a stream of "this key just expired"
//! events for one logical database.
//!
//! # Module Organization
//!
//! - [`config`] - Connection target, database index and default TTL
//! - [`memory`] - In-process backend with timer-driven expiry
//! - [`redis_store`] - Redis backend using `SETEX` and keyspace notifications

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::StoreResult;

pub mod config;
pub mod memory;
pub mod redis_store;

pub use config::StoreConfig;
pub use memory::{InMemoryStore, StoreStats};
pub use redis_store::{RedisExpirationNotifier, RedisStore};

/// TTL-aware key-value storage of serialized payloads
///
/// Every write is a full overwrite that (re)schedules the key's expiration.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the payload stored under `key`, if any
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Overwrite `key` with `value`, expiring after `ttl`
    async fn set_with_ttl(&self, key: &str, ttl: Duration, value: &str) -> StoreResult<()>;
}

/// A key-expiration notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirationEvent {
    /// Event type reported by the backend (normally `expired`)
    pub event_type: String,
    /// Name of the key that expired
    pub key: String,
}

impl ExpirationEvent {
    pub fn expired(key: impl Into<String>) -> Self {
        Self {
            event_type: crate::constants::store::EXPIRED_EVENT.to_string(),
            key: key.into(),
        }
    }
}

/// Infinite, non-restartable stream of expiration events
pub type ExpirationStream = BoxStream<'static, ExpirationEvent>;

/// Source of key-expiration events
///
/// Delivery is at-most-once per expiration with no replay; consumers must
/// tolerate missed events.
#[async_trait]
pub trait ExpirationNotifier: Send + Sync {
    /// Start receiving expiration events
    async fn subscribe(&self) -> StoreResult<ExpirationStream>;
}
