//! Redis backend
//!
//! Values are written with `SETEX` so the server owns expiry. Expiration
//! events come from Redis keyspace notifications on
//! `__keyevent@<db>__:expired`, which requires `notify-keyspace-events` to
//! include `Ex` (see [`RedisStore::enable_expiry_notifications`]).

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, IntoConnectionInfo};
use tracing::{debug, info, warn};

use super::config::StoreConfig;
use super::{ExpirationEvent, ExpirationNotifier, ExpirationStream, KeyValueStore};
use crate::constants::store::{EXPIRED_EVENT, KEYSPACE_EVENTS_EXPIRED};
use crate::errors::{StoreError, StoreResult};

/// Build a client bound to the configured logical database
fn open_client(config: &StoreConfig) -> StoreResult<Client> {
    let mut info = config.url.as_str().into_connection_info()?;
    info.redis.db = i64::from(config.db);
    Ok(Client::open(info)?)
}

/// Redis-backed key-value store
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    db: u32,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("db", &self.db).finish()
    }
}

impl RedisStore {
    /// Connect to the configured server and database
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Redis` if the URL is invalid or the server is unreachable
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let client = open_client(config)?;
        let connection = ConnectionManager::new(client).await?;

        info!("Connected to Redis at {} (db {})", config.url, config.db);

        let store = Self {
            connection,
            db: config.db,
        };

        if config.configure_keyspace_events {
            store.enable_expiry_notifications().await?;
        }

        Ok(store)
    }

    /// Ask the server to publish expired-key events
    pub async fn enable_expiry_notifications(&self) -> StoreResult<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("CONFIG")
            .arg("SET")
            .arg("notify-keyspace-events")
            .arg(KEYSPACE_EVENTS_EXPIRED)
            .query_async(&mut conn)
            .await?;

        info!("Enabled Redis expired-key notifications");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, ttl: Duration, value: &str) -> StoreResult<()> {
        let seconds = ttl.as_secs();
        if seconds == 0 {
            return Err(StoreError::InvalidTtl {
                key: key.to_string(),
            });
        }

        let mut conn = self.connection.clone();
        let _: () = conn.set_ex(key, value, seconds).await?;
        Ok(())
    }
}

/// Subscriber for Redis expired-key events
///
/// Holds its own client; each subscription opens a dedicated pub/sub
/// connection that lives as long as the returned stream.
#[derive(Debug, Clone)]
pub struct RedisExpirationNotifier {
    client: Client,
    channel: String,
}

impl RedisExpirationNotifier {
    /// Create a notifier for the configured database
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        Ok(Self {
            client: open_client(config)?,
            channel: config.expired_channel(),
        })
    }

    /// Channel this notifier listens on
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl ExpirationNotifier for RedisExpirationNotifier {
    async fn subscribe(&self) -> StoreResult<ExpirationStream> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;

        info!("Subscribed to {}", self.channel);

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            match msg.get_payload::<String>() {
                Ok(key) => {
                    let event_type = msg
                        .get_channel_name()
                        .rsplit(':')
                        .next()
                        .unwrap_or(EXPIRED_EVENT)
                        .to_string();
                    debug!("Received {} event for {}", event_type, key);
                    Some(ExpirationEvent { event_type, key })
                }
                Err(e) => {
                    warn!("Ignoring expiration message with unreadable payload: {}", e);
                    None
                }
            }
        });

        Ok(stream.boxed())
    }
}
