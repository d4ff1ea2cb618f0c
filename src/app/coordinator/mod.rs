//! Expiration-driven refresh of catchment aggregates
//!
//! When a cached aggregate expires, the coordinator rebuilds it straight away
//! instead of leaving the next reader to pay for the miss. The work runs as
//! a small pipeline of tasks:
//!
//! 1. A consumer reads the expiration stream, keeps the events whose key is a
//!    `catchmentdata` key in our namespace, and queues the catchment id on a
//!    bounded channel.
//! 2. A dispatcher takes ids off the queue and starts one retry chain per
//!    catchment. An id whose chain is still running is counted as coalesced
//!    and dropped.
//! 3. Each chain rebuilds the aggregate with the cache read bypassed,
//!    retrying on a fixed delay until it succeeds or shutdown is broadcast.
//!
//! # Architecture
//!
//! - [`config`] - Retry delay, queue capacity and shutdown timeout
//! - [`stats`] - Event and refresh counters
//! - [`signals`] - Signal handling for graceful shutdown
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use catchment_cache::app::{
//!     CacheAsideResolver, CatchmentAggregator, HttpDataProvider, InMemoryStore,
//!     ProviderConfig, RefreshConfig, RefreshCoordinator,
//! };
//! use catchment_cache::app::coordinator::signals::create_shutdown_channel;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryStore::new());
//! let provider = Arc::new(HttpDataProvider::new(&ProviderConfig::default())?);
//! let resolver = CacheAsideResolver::new(store.clone(), std::time::Duration::from_secs(43_200));
//! let aggregator = Arc::new(CatchmentAggregator::new(resolver, provider));
//!
//! let coordinator = RefreshCoordinator::new(aggregator, store, RefreshConfig::default());
//! let (shutdown_tx, _) = create_shutdown_channel();
//! let stats = coordinator.run(shutdown_tx).await?;
//! println!("{}", stats.summary());
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, trace, warn};

use crate::app::aggregator::CatchmentAggregator;
use crate::app::keys::{CacheKey, EntityKind};
use crate::app::retry::RetryScheduler;
use crate::app::store::{ExpirationNotifier, ExpirationStream};
use crate::errors::Result;

pub mod config;
pub mod signals;
pub mod stats;

pub use config::RefreshConfig;
pub use signals::{
    create_shutdown_channel, next_shutdown_signal, wait_for_shutdown_signal, ShutdownReason,
    SignalHandler,
};
pub use stats::RefreshStats;

/// Rebuilds expired catchment aggregates
#[derive(Clone)]
pub struct RefreshCoordinator {
    aggregator: Arc<CatchmentAggregator>,
    notifier: Arc<dyn ExpirationNotifier>,
    scheduler: RetryScheduler,
    config: RefreshConfig,
    stats: Arc<RwLock<RefreshStats>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("aggregator", &self.aggregator)
            .field("config", &self.config)
            .finish()
    }
}

impl RefreshCoordinator {
    pub fn new(
        aggregator: Arc<CatchmentAggregator>,
        notifier: Arc<dyn ExpirationNotifier>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            aggregator,
            notifier,
            scheduler: RetryScheduler::new(config.retry_delay),
            config,
            stats: Arc::new(RwLock::new(RefreshStats::default())),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Snapshot of the current counters
    pub async fn stats(&self) -> RefreshStats {
        self.stats.read().await.clone()
    }

    /// Catchment id named by an expired key, if it is one of our aggregates
    pub fn catchment_for_key(&self, key: &str) -> Option<String> {
        let key = CacheKey::parse(self.aggregator.namespace(), key)?;
        if key.kind() != EntityKind::CatchmentData {
            return None;
        }
        key.identifier().map(str::to_string)
    }

    /// Subscribe to expirations and start the consumer and dispatcher tasks
    ///
    /// Tasks stop once `shutdown_tx` broadcasts; use
    /// [`RefreshHandle::shutdown`] to wait for them afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the expiration subscription cannot be opened
    pub async fn start(&self, shutdown_tx: &broadcast::Sender<()>) -> Result<RefreshHandle> {
        let events = self.notifier.subscribe().await?;
        let (work_tx, work_rx) = mpsc::channel(self.config.queue_capacity);

        let consumer = tokio::spawn(
            self.clone()
                .consume(events, work_tx, shutdown_tx.subscribe()),
        );
        let dispatcher = tokio::spawn(self.clone().dispatch(work_rx, shutdown_tx.clone()));

        info!(
            "Refresh coordinator started (retry delay {:?}, queue capacity {})",
            self.config.retry_delay, self.config.queue_capacity
        );

        Ok(RefreshHandle {
            consumer,
            dispatcher,
            shutdown_timeout: self.config.shutdown_timeout,
        })
    }

    /// Run until shutdown is broadcast, then wait for tasks and return the final counters
    ///
    /// # Errors
    ///
    /// Returns an error if the expiration subscription cannot be opened
    pub async fn run(&self, shutdown_tx: broadcast::Sender<()>) -> Result<RefreshStats> {
        let shutdown_rx = shutdown_tx.subscribe();
        let handle = self.start(&shutdown_tx).await?;

        wait_for_shutdown_signal(shutdown_rx).await;
        info!("Refresh coordinator shutting down");
        handle.shutdown().await;

        let stats = self.stats().await;
        info!("Refresh coordinator stopped: {}", stats.summary());
        Ok(stats)
    }

    async fn consume(
        self,
        mut events: ExpirationStream,
        work_tx: mpsc::Sender<String>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                event = events.next() => {
                    let Some(event) = event else {
                        warn!("Expiration stream ended; proactive refresh has stopped");
                        break;
                    };

                    self.stats.write().await.events_received += 1;

                    let Some(catchment_id) = self.catchment_for_key(&event.key) else {
                        trace!("Ignoring {} event for {}", event.event_type, event.key);
                        continue;
                    };

                    self.stats.write().await.events_matched += 1;
                    debug!("Aggregate for catchment {} expired", catchment_id);

                    if work_tx.send(catchment_id).await.is_err() {
                        debug!("Refresh dispatcher gone, stopping consumer");
                        break;
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("Expiration consumer received shutdown signal");
                    break;
                }
            }
        }
    }

    async fn dispatch(self, mut work_rx: mpsc::Receiver<String>, shutdown_tx: broadcast::Sender<()>) {
        let mut shutdown_rx = shutdown_tx.subscribe();
        let mut chains = JoinSet::new();

        loop {
            tokio::select! {
                next = work_rx.recv() => {
                    let Some(catchment_id) = next else { break };
                    self.start_chain(&mut chains, catchment_id, shutdown_tx.subscribe())
                        .await;
                }
                Some(_) = chains.join_next(), if !chains.is_empty() => {}
                _ = shutdown_rx.recv() => {
                    debug!("Refresh dispatcher received shutdown signal");
                    break;
                }
            }
        }

        while chains.join_next().await.is_some() {}
        debug!("All refresh chains finished");
    }

    async fn start_chain(
        &self,
        chains: &mut JoinSet<()>,
        catchment_id: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        if !self.in_flight.lock().await.insert(catchment_id.clone()) {
            self.stats.write().await.coalesced += 1;
            debug!(
                "Refresh of catchment {} already running, coalescing",
                catchment_id
            );
            return;
        }
        self.stats.write().await.refreshes_started += 1;

        let coordinator = self.clone();
        chains.spawn(async move {
            let label = format!("Refresh of catchment {}", catchment_id);
            let aggregator = &coordinator.aggregator;
            let stats = &coordinator.stats;

            let result = coordinator
                .scheduler
                .retry_until_shutdown(
                    &label,
                    || async {
                        let result = aggregator.get_catchment_data(&catchment_id, true).await;
                        if result.is_err() {
                            stats.write().await.failed_attempts += 1;
                        }
                        result
                    },
                    &mut shutdown_rx,
                )
                .await;

            coordinator.in_flight.lock().await.remove(&catchment_id);

            let mut stats = coordinator.stats.write().await;
            match result {
                Some(Some(collection)) => {
                    stats.refreshes_completed += 1;
                    info!(
                        "Refreshed catchment {} ({} stations with forecasts)",
                        catchment_id,
                        collection.len()
                    );
                }
                Some(None) => {
                    stats.refreshes_completed += 1;
                    info!(
                        "Catchment {} has no stations, nothing re-cached",
                        catchment_id
                    );
                }
                None => stats.refreshes_cancelled += 1,
            }
        });
    }
}

/// Running consumer and dispatcher tasks
#[derive(Debug)]
pub struct RefreshHandle {
    consumer: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
    shutdown_timeout: std::time::Duration,
}

impl RefreshHandle {
    /// Wait for the tasks to finish after shutdown has been broadcast
    pub async fn shutdown(self) {
        debug!("Waiting for refresh tasks to stop");

        for (name, task) in [("consumer", self.consumer), ("dispatcher", self.dispatcher)] {
            if tokio::time::timeout(self.shutdown_timeout, task)
                .await
                .is_err()
            {
                warn!(
                    "Refresh {} shutdown timed out after {:?}",
                    name, self.shutdown_timeout
                );
            }
        }

        debug!("Refresh tasks stopped");
    }
}
