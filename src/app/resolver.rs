//! Cache-aside resolution
//!
//! [`CacheAsideResolver`] is the get-or-compute-and-cache primitive every
//! cached read goes through. A hit is returned without calling `compute`; a
//! miss calls it once and writes the result back only when it is worth
//! caching, so an upstream that has nothing to say is asked again next time.
//!
//! With single-flight enabled, concurrent misses for one key queue on a
//! per-key guard and re-read the store once they get it, which keeps
//! duplicate upstream calls down without changing results.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, trace, warn};

use crate::app::keys::CacheKey;
use crate::app::models::FeatureCollection;
use crate::app::store::KeyValueStore;
use crate::errors::{Result, StoreError};

/// Decides whether a computed value is written to the store
pub trait CacheValue {
    fn is_cacheable(&self) -> bool;
}

impl CacheValue for Value {
    /// `null`, `false`, `0`, `""`, `[]` and `{}` are not cached
    fn is_cacheable(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
        }
    }
}

impl CacheValue for FeatureCollection {
    // A built aggregate is data even with zero features
    fn is_cacheable(&self) -> bool {
        true
    }
}

impl<T: CacheValue> CacheValue for Option<T> {
    fn is_cacheable(&self) -> bool {
        self.as_ref().is_some_and(CacheValue::is_cacheable)
    }
}

type InFlightMap = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Get-or-compute-and-cache over a [`KeyValueStore`]
pub struct CacheAsideResolver {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
    single_flight: bool,
    in_flight: Arc<InFlightMap>,
}

impl std::fmt::Debug for CacheAsideResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAsideResolver")
            .field("ttl", &self.ttl)
            .field("single_flight", &self.single_flight)
            .finish()
    }
}

impl CacheAsideResolver {
    /// Create a resolver writing entries with `ttl`
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            single_flight: true,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Enable or disable the per-key single-flight guard
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn single_flight(&self) -> bool {
        self.single_flight
    }

    /// Return the cached value for `key`, computing and caching it on a miss
    ///
    /// # Errors
    ///
    /// Store read/write failures and errors from `compute` propagate.
    pub async fn resolve<T, F, Fut>(&self, key: &CacheKey, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + CacheValue + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let key = key.to_string();

        if let Some(hit) = self.read(&key).await? {
            return Ok(hit);
        }

        if !self.single_flight {
            return self.compute_and_store(&key, compute).await;
        }

        let _flight = self.enter(&key).await;

        // Another caller may have filled the key while we waited
        if let Some(hit) = self.read(&key).await? {
            trace!("Key {} filled while waiting for in-flight computation", key);
            return Ok(hit);
        }

        self.compute_and_store(&key, compute).await
    }

    /// Recompute `key` without reading the store first
    ///
    /// The value is still written back when cacheable.
    pub async fn refresh<T, F, Fut>(&self, key: &CacheKey, compute: F) -> Result<T>
    where
        T: Serialize + CacheValue + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let key = key.to_string();
        debug!("Bypassing cache read for {}", key);

        let _flight = if self.single_flight {
            Some(self.enter(&key).await)
        } else {
            None
        };

        self.compute_and_store(&key, compute).await
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.get(key).await? else {
            debug!("Cache miss: {}", key);
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("Cache hit: {}", key);
                Ok(Some(value))
            }
            Err(e) => {
                warn!(
                    "Discarding malformed cached payload for {}: {}; recomputing",
                    key, e
                );
                Ok(None)
            }
        }
    }

    async fn compute_and_store<T, F, Fut>(&self, key: &str, compute: F) -> Result<T>
    where
        T: Serialize + CacheValue + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let value = compute().await?;

        if !value.is_cacheable() {
            debug!("Not caching empty value for {}", key);
            return Ok(value);
        }

        let payload = serde_json::to_string(&value).map_err(|source| StoreError::Serialization {
            key: key.to_string(),
            source,
        })?;
        self.store.set_with_ttl(key, self.ttl, &payload).await?;
        debug!("Cached {} for {}s", key, self.ttl.as_secs());

        Ok(value)
    }

    /// Wait for exclusive use of `key`
    async fn enter(&self, key: &str) -> FlightGuard {
        let slot = {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            in_flight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let permit = slot.clone().lock_owned().await;

        FlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            key: key.to_string(),
            slot,
            permit: Some(permit),
        }
    }
}

/// Holds a key's in-flight slot; the slot is dropped with its last holder
struct FlightGuard {
    in_flight: Arc<InFlightMap>,
    key: String,
    slot: Arc<AsyncMutex<()>>,
    permit: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.permit.take();

        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only the map and this guard hold the slot: nobody is waiting
        if Arc::strong_count(&self.slot) == 2 {
            in_flight.remove(&self.key);
        }
    }
}
