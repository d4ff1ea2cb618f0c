//! Integration tests for expiry-driven refresh against the in-memory store

mod common;

use std::sync::Arc;
use std::time::Duration;

use catchment_cache::app::{
    create_shutdown_channel, InMemoryStore, KeyValueStore, RefreshConfig, RefreshCoordinator,
};
use common::{aggregator, catchment_42, wait_until, MockProvider};

const TTL: Duration = Duration::from_secs(60);

#[tokio::test(start_paused = true)]
async fn test_expired_aggregate_is_rebuilt() {
    let provider = Arc::new(catchment_42());
    let store = Arc::new(InMemoryStore::new());
    let aggregator = Arc::new(aggregator(provider.clone(), store.clone(), TTL));

    let coordinator = RefreshCoordinator::new(
        aggregator.clone(),
        store.clone(),
        RefreshConfig::default().with_retry_delay(Duration::from_secs(1)),
    );
    let (shutdown_tx, _) = create_shutdown_channel();
    let handle = coordinator.start(&shutdown_tx).await.unwrap();

    let original = aggregator.get_catchment_data("42", false).await.unwrap();
    assert!(store.contains("mike:catchmentdata:42").await);
    assert_eq!(MockProvider::calls(&provider.station_list_calls), 1);

    wait_until(Duration::from_secs(1), || {
        let coordinator = coordinator.clone();
        async move { coordinator.stats().await.refreshes_completed >= 1 }
    })
    .await;

    let stats = coordinator.stats().await;
    assert!(stats.events_matched >= 1);
    assert_eq!(stats.failed_attempts, 0);
    assert!(store.stats().await.expirations >= 1);
    assert!(store.contains("mike:catchmentdata:42").await);

    // A normal read after the refresh is a cache hit with the same content
    let calls_before = MockProvider::calls(&provider.series_calls);
    let refreshed = aggregator.get_catchment_data("42", false).await.unwrap();
    assert_eq!(original, refreshed);
    assert_eq!(MockProvider::calls(&provider.series_calls), calls_before);

    shutdown_tx.send(()).unwrap();
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unrelated_expiry_does_not_refresh() {
    let provider = Arc::new(catchment_42());
    let store = Arc::new(InMemoryStore::new());
    let aggregator = Arc::new(aggregator(provider.clone(), store.clone(), TTL));

    let coordinator =
        RefreshCoordinator::new(aggregator.clone(), store.clone(), RefreshConfig::default());
    let (shutdown_tx, _) = create_shutdown_channel();
    let handle = coordinator.start(&shutdown_tx).await.unwrap();

    aggregator.list_catchment_ids().await.unwrap();
    store
        .set_with_ttl("other:catchmentdata:42", TTL, "{}")
        .await
        .unwrap();

    wait_until(Duration::from_secs(1), || {
        let coordinator = coordinator.clone();
        async move { coordinator.stats().await.events_received >= 2 }
    })
    .await;

    let stats = coordinator.stats().await;
    assert_eq!(stats.events_matched, 0);
    assert_eq!(stats.refreshes_started, 0);
    assert_eq!(MockProvider::calls(&provider.station_list_calls), 0);

    shutdown_tx.send(()).unwrap();
    handle.shutdown().await;
}
