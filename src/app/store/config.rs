//! Store configuration types and defaults
//!
//! This module contains the configuration for the key-value backend,
//! including connection target normalization and validation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::store;

/// Configuration for the key-value store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection target (`redis://host:port`)
    pub url: String,
    /// Logical database index
    pub db: u32,
    /// TTL applied to every cache write
    pub default_ttl: Duration,
    /// Namespace prefix of every cache key
    pub key_namespace: String,
    /// Enable expired-key notifications on the server at startup
    pub configure_keyspace_events: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: store::DEFAULT_REDIS_URL.to_string(),
            db: store::DEFAULT_DB_INDEX,
            default_ttl: store::DEFAULT_TTL,
            key_namespace: store::KEY_NAMESPACE.to_string(),
            configure_keyspace_events: false,
        }
    }
}

impl StoreConfig {
    /// Set the connection target, accepting a bare port
    pub fn with_url(mut self, url: impl AsRef<str>) -> Self {
        self.url = normalize_url(url.as_ref());
        self
    }

    /// Set the logical database index
    pub fn with_db(mut self, db: u32) -> Self {
        self.db = db;
        self
    }

    /// Set the default TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the key namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.key_namespace = namespace.into();
        self
    }

    /// Pub/sub channel carrying this database's expired-key events
    pub fn expired_channel(&self) -> String {
        store::expired_channel(self.db)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.default_ttl.as_secs() == 0 {
            return Err("Default TTL must be at least one second".to_string());
        }

        if self.key_namespace.is_empty() {
            return Err("Key namespace cannot be empty".to_string());
        }

        if self.key_namespace.contains(store::KEY_SEPARATOR) {
            return Err(format!(
                "Key namespace cannot contain '{}'",
                store::KEY_SEPARATOR
            ));
        }

        Ok(())
    }
}

/// Normalize a connection target
///
/// A bare port (`6379`) becomes `redis://127.0.0.1:6379`, a bare `host:port`
/// gets the `redis://` scheme, anything else is kept as given.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();

    if raw.is_empty() {
        return store::DEFAULT_REDIS_URL.to_string();
    }

    if raw.parse::<u16>().is_ok() {
        return format!("redis://{}:{}", store::DEFAULT_REDIS_HOST, raw);
    }

    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("redis://{}", raw)
    }
}
