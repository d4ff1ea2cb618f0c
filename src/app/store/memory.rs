//! In-process key-value backend with timer-driven expiry
//!
//! Each write schedules a task that removes the entry at its deadline unless
//! the key was overwritten in the meantime, then broadcasts an expiration
//! event. Used by tests and by the CLI's `--memory-store` development mode.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, trace};

use super::{ExpirationEvent, ExpirationNotifier, ExpirationStream, KeyValueStore};
use crate::constants::store::MEMORY_EVENT_CAPACITY;
use crate::errors::{StoreError, StoreResult};

/// Operation counters for the in-memory store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of `get` calls
    pub reads: u64,
    /// Number of `get` calls that found a value
    pub hits: u64,
    /// Number of `set_with_ttl` calls
    pub writes: u64,
    /// Number of keys removed by TTL expiry
    pub expirations: u64,
}

#[derive(Debug)]
struct Entry {
    value: String,
    generation: u64,
}

#[derive(Debug)]
struct Inner {
    entries: RwLock<HashMap<String, Entry>>,
    stats: RwLock<StoreStats>,
    next_generation: AtomicU64,
    events: broadcast::Sender<ExpirationEvent>,
}

/// TTL-expiring in-memory store that also emits expiration events
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(MEMORY_EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                stats: RwLock::new(StoreStats::default()),
                next_generation: AtomicU64::new(1),
                events,
            }),
        }
    }

    /// Current operation counters
    pub async fn stats(&self) -> StoreStats {
        self.inner.stats.read().await.clone()
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether `key` currently holds a value
    pub async fn contains(&self, key: &str) -> bool {
        self.inner.entries.read().await.contains_key(key)
    }

    /// Expire `key` immediately, as if its TTL had elapsed
    ///
    /// Returns `false` when the key did not exist.
    pub async fn expire_now(&self, key: &str) -> bool {
        Inner::expire(&self.inner, key, None).await
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    /// Remove `key` and broadcast its expiration
    ///
    /// With `generation` set, only the write that scheduled this expiry may
    /// be removed; a later overwrite carries a new generation and survives.
    async fn expire(inner: &Inner, key: &str, generation: Option<u64>) -> bool {
        {
            let mut entries = inner.entries.write().await;
            match entries.get(key) {
                Some(entry) if generation.map_or(true, |g| g == entry.generation) => {
                    entries.remove(key);
                }
                Some(_) => {
                    trace!("Skipping stale expiry for overwritten key {}", key);
                    return false;
                }
                None => return false,
            }
        }

        inner.stats.write().await.expirations += 1;
        debug!("Key expired: {}", key);

        // No subscribers is fine: delivery is fire-and-forget
        let _ = inner.events.send(ExpirationEvent::expired(key));
        true
    }

    fn schedule_expiry(inner: Weak<Inner>, key: String, ttl: Duration, generation: u64) {
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = inner.upgrade() {
                Inner::expire(&inner, &key, Some(generation)).await;
            }
        });
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .inner
            .entries
            .read()
            .await
            .get(key)
            .map(|entry| entry.value.clone());

        let mut stats = self.inner.stats.write().await;
        stats.reads += 1;
        if value.is_some() {
            stats.hits += 1;
        }

        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, ttl: Duration, value: &str) -> StoreResult<()> {
        if ttl.is_zero() {
            return Err(StoreError::InvalidTtl {
                key: key.to_string(),
            });
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        self.inner.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                generation,
            },
        );
        self.inner.stats.write().await.writes += 1;

        Inner::schedule_expiry(Arc::downgrade(&self.inner), key.to_string(), ttl, generation);
        Ok(())
    }
}

#[async_trait]
impl ExpirationNotifier for InMemoryStore {
    async fn subscribe(&self) -> StoreResult<ExpirationStream> {
        let rx = self.inner.events.subscribe();

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        debug!("Expiration subscriber lagged, {} events dropped", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_and_set() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store
            .set_with_ttl("k", Duration::from_secs(60), "v")
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        let stats = store.stats().await;
        assert_eq!(stats.reads, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.writes, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let store = InMemoryStore::new();
        let result = store.set_with_ttl("k", Duration::ZERO, "v").await;
        assert!(matches!(result, Err(StoreError::InvalidTtl { .. })));
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_and_notifies() {
        let store = InMemoryStore::new();
        let mut events = store.subscribe().await.unwrap();

        store
            .set_with_ttl("mike:catchmentdata:1", Duration::from_secs(30), "{}")
            .await
            .unwrap();

        let event = events.next().await.unwrap();
        assert_eq!(event, ExpirationEvent::expired("mike:catchmentdata:1"));
        assert!(!store.contains("mike:catchmentdata:1").await);
        assert_eq!(store.stats().await.expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_reschedules_expiry() {
        let store = InMemoryStore::new();

        store
            .set_with_ttl("k", Duration::from_secs(10), "old")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        store
            .set_with_ttl("k", Duration::from_secs(10), "new")
            .await
            .unwrap();

        // First deadline passes, overwritten entry survives
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(store.get("k").await.unwrap(), Some("new".to_string()));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.stats().await.expirations, 1);
    }

    #[tokio::test]
    async fn test_expire_now() {
        let store = InMemoryStore::new();
        let mut events = store.subscribe().await.unwrap();

        store
            .set_with_ttl("k", Duration::from_secs(60), "v")
            .await
            .unwrap();
        assert!(store.expire_now("k").await);
        assert!(!store.expire_now("k").await);

        assert_eq!(events.next().await.unwrap().key, "k");
    }
}
