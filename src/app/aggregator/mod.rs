//! Catchment aggregation
//!
//! [`CatchmentAggregator`] exposes the four cached provider reads and the
//! composite stations-with-forecasts read built from them. Every read goes
//! through the [`CacheAsideResolver`] under its own kind-scoped key.
//!
//! # Module Organization
//!
//! - [`aggregate`] - Pure freshness filter and station matching

use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::app::keys::{station_path, CacheKey};
use crate::app::models::{FeatureCollection, StationTimeSeries};
use crate::app::provider::DataProvider;
use crate::app::resolver::CacheAsideResolver;
use crate::constants::provider::{CATCHMENT_ITEMS_KIND, DEFAULT_DETAILS_AS_OF};
use crate::constants::store::KEY_NAMESPACE;
use crate::errors::{ProviderError, Result};

pub mod aggregate;

pub use aggregate::aggregate;

/// Cached reads of catchments, stations and forecasts
pub struct CatchmentAggregator {
    resolver: CacheAsideResolver,
    provider: Arc<dyn DataProvider>,
    namespace: String,
    details_as_of: String,
}

impl std::fmt::Debug for CatchmentAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatchmentAggregator")
            .field("resolver", &self.resolver)
            .field("namespace", &self.namespace)
            .field("details_as_of", &self.details_as_of)
            .finish()
    }
}

impl CatchmentAggregator {
    pub fn new(resolver: CacheAsideResolver, provider: Arc<dyn DataProvider>) -> Self {
        Self {
            resolver,
            provider,
            namespace: KEY_NAMESPACE.to_string(),
            details_as_of: DEFAULT_DETAILS_AS_OF.to_string(),
        }
    }

    /// Use a different key namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Reference date sent with catchment detail requests
    pub fn with_details_as_of(mut self, as_of: impl Into<String>) -> Self {
        self.details_as_of = as_of.into();
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn resolver(&self) -> &CacheAsideResolver {
        &self.resolver
    }

    /// All catchment ids
    pub async fn list_catchment_ids(&self) -> Result<Value> {
        let key = CacheKey::catchment_ids(&self.namespace);
        self.resolver
            .resolve(&key, || async {
                Ok(self
                    .provider
                    .list_feature_collection(CATCHMENT_ITEMS_KIND)
                    .await?)
            })
            .await
    }

    /// Details for `ids`, cached per id order
    pub async fn get_catchment_details(&self, ids: &[String]) -> Result<Value> {
        let key = CacheKey::catchment_details(&self.namespace, ids);
        self.resolver
            .resolve(&key, || async {
                Ok(self
                    .provider
                    .get_feature_type_info(ids, &self.details_as_of)
                    .await?)
            })
            .await
    }

    /// Station feature collection of a catchment, as the provider returns it
    pub async fn get_catchment_stations(&self, catchment_id: &str) -> Result<Value> {
        let key = CacheKey::catchment_stations(&self.namespace, catchment_id);
        self.resolver
            .resolve(&key, || async {
                let selector = self.provider.selector_template().select(catchment_id);
                Ok(self.provider.list_features(&selector).await?)
            })
            .await
    }

    /// Time series of one station, addressed as `catchmentId/stationId`
    pub async fn get_station_data(&self, station_path: &str) -> Result<Value> {
        let key = CacheKey::station_data(&self.namespace, station_path);
        self.resolver
            .resolve(&key, || async {
                let selector = self.provider.selector_template().select(station_path);
                Ok(self.provider.list_time_series(&selector).await?)
            })
            .await
    }

    /// Stations of a catchment enriched with their future forecast points
    ///
    /// Returns `None` when the catchment has no stations; nothing is cached
    /// in that case. With `bypass_cache` the aggregate is rebuilt and
    /// rewritten without reading its own key first.
    ///
    /// # Errors
    ///
    /// Any failure fetching the station list or a station's time series
    /// fails the whole call; no partial aggregate is returned or cached.
    pub async fn get_catchment_data(
        &self,
        catchment_id: &str,
        bypass_cache: bool,
    ) -> Result<Option<FeatureCollection>> {
        let key = CacheKey::catchment_data(&self.namespace, catchment_id);
        let compute = || self.build_catchment_data(catchment_id);

        if bypass_cache {
            self.resolver.refresh(&key, compute).await
        } else {
            self.resolver.resolve(&key, compute).await
        }
    }

    async fn build_catchment_data(&self, catchment_id: &str) -> Result<Option<FeatureCollection>> {
        let raw = self.get_catchment_stations(catchment_id).await?;
        let Some(stations) = decode::<FeatureCollection>(raw, catchment_id)? else {
            debug!("Catchment {} has no station list", catchment_id);
            return Ok(None);
        };
        if stations.is_empty() {
            debug!("Catchment {} has no stations", catchment_id);
            return Ok(None);
        }

        let paths: Vec<String> = stations
            .features
            .iter()
            .filter_map(|station| {
                let id = station.station_id();
                if id.is_none() {
                    warn!(
                        "Station without {} in catchment {}, skipping",
                        crate::app::models::STATION_ID_PROPERTY,
                        catchment_id
                    );
                }
                id
            })
            .map(|station_id| station_path(catchment_id, &station_id))
            .collect();

        let fetches: Vec<_> = paths
            .iter()
            .map(|path| self.get_station_data(path))
            .collect();
        let raw_series = try_join_all(fetches).await?;

        let mut responses = Vec::with_capacity(raw_series.len());
        for (raw, path) in raw_series.into_iter().zip(&paths) {
            match decode::<StationTimeSeries>(raw, path) {
                Ok(Some(series)) => responses.push(series),
                Ok(None) => {}
                Err(e) => warn!("Skipping station {}: {}", path, e),
            }
        }

        let collection = aggregate(&stations, &responses, Utc::now());
        info!(
            "Aggregated catchment {}: {} of {} stations have forecasts",
            catchment_id,
            collection.len(),
            stations.len()
        );

        Ok(Some(collection))
    }
}

/// Decode a provider payload, treating `null` as absent
fn decode<T: DeserializeOwned>(raw: Value, context: &str) -> Result<Option<T>> {
    if raw.is_null() {
        return Ok(None);
    }
    serde_json::from_value(raw)
        .map(Some)
        .map_err(|source| {
            ProviderError::Decode {
                context: context.to_string(),
                source,
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::provider::{ConfigSelector, SelectorTemplate};
    use crate::app::store::{InMemoryStore, KeyValueStore};
    use crate::errors::ProviderResult;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeProvider {
        template: SelectorTemplate,
        stations: HashMap<String, Value>,
        series: HashMap<String, Value>,
        failing_station: Option<String>,
        station_list_calls: AtomicUsize,
        series_calls: AtomicUsize,
        series_delay: Duration,
    }

    #[async_trait]
    impl DataProvider for FakeProvider {
        async fn list_feature_collection(&self, _kind: &str) -> ProviderResult<Value> {
            Ok(json!(["42", "43"]))
        }

        async fn get_feature_type_info(&self, ids: &[String], as_of: &str) -> ProviderResult<Value> {
            Ok(json!({"ids": ids, "asOf": as_of}))
        }

        async fn list_features(&self, selector: &ConfigSelector) -> ProviderResult<Value> {
            self.station_list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .stations
                .get(selector.id())
                .cloned()
                .unwrap_or(Value::Null))
        }

        async fn list_time_series(&self, selector: &ConfigSelector) -> ProviderResult<Value> {
            self.series_calls.fetch_add(1, Ordering::SeqCst);
            if !self.series_delay.is_zero() {
                tokio::time::sleep(self.series_delay).await;
            }
            if self.failing_station.as_deref() == Some(selector.id()) {
                return Err(ProviderError::ServerError {
                    status: 503,
                    endpoint: "timeseries".to_string(),
                });
            }
            Ok(self
                .series
                .get(selector.id())
                .cloned()
                .unwrap_or(Value::Null))
        }

        fn selector_template(&self) -> &SelectorTemplate {
            &self.template
        }
    }

    fn station(id: &str) -> Value {
        json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
            "properties": {"spreadsheetitemid": id}
        })
    }

    fn catchment_42() -> FakeProvider {
        let mut provider = FakeProvider::default();
        provider.stations.insert(
            "42".to_string(),
            json!({"type": "FeatureCollection", "features": [station("A"), station("B")]}),
        );
        provider.series.insert(
            "42/A".to_string(),
            json!({"Name": "A", "Data": [["2000-01-01", 1.0]], "Metadata": {}}),
        );
        provider.series.insert(
            "42/B".to_string(),
            json!({"Name": "B", "Data": [["2099-01-01T00:00:00Z", 5.3]], "Metadata": {"unit": "m"}}),
        );
        provider
    }

    fn aggregator(provider: Arc<FakeProvider>, store: Arc<InMemoryStore>) -> CatchmentAggregator {
        let resolver = CacheAsideResolver::new(store, Duration::from_secs(60));
        CatchmentAggregator::new(resolver, provider)
    }

    #[tokio::test]
    async fn test_catchment_data_keeps_only_forecasting_stations() {
        let store = Arc::new(InMemoryStore::new());
        let aggregator = aggregator(Arc::new(catchment_42()), store.clone());

        let data = aggregator.get_catchment_data("42", false).await.unwrap().unwrap();

        assert_eq!(data.len(), 1);
        let feature = &data.features[0];
        assert_eq!(feature.station_id().as_deref(), Some("B"));
        assert_eq!(
            feature.properties["data"],
            json!([{"time": "2099-01-01T00:00:00Z", "value": 5.3}])
        );
        assert!(store.contains("mike:catchmentdata:42").await);
        assert!(store.contains("mike:catchmentstations:42").await);
        assert!(store.contains("mike:stationsdata:42/B").await);
    }

    #[tokio::test]
    async fn test_second_read_is_a_cache_hit() {
        let provider = Arc::new(catchment_42());
        let store = Arc::new(InMemoryStore::new());
        let aggregator = aggregator(provider.clone(), store.clone());

        let first = aggregator.get_catchment_data("42", false).await.unwrap();
        let second = aggregator.get_catchment_data("42", false).await.unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(provider.station_list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.series_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_bypass_rebuilds_from_cached_parts() {
        let provider = Arc::new(catchment_42());
        let store = Arc::new(InMemoryStore::new());
        let aggregator = aggregator(provider.clone(), store.clone());

        aggregator.get_catchment_data("42", false).await.unwrap();
        let writes_before = store.stats().await.writes;

        aggregator.get_catchment_data("42", true).await.unwrap();

        // Only the aggregate is rewritten; stations and series come from cache
        assert_eq!(store.stats().await.writes, writes_before + 1);
        assert_eq!(provider.station_list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_catchment_yields_nothing_and_caches_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let aggregator = aggregator(Arc::new(catchment_42()), store.clone());

        assert!(aggregator.get_catchment_data("99", false).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_station_failure_fails_whole_aggregate() {
        let mut provider = catchment_42();
        provider.failing_station = Some("42/A".to_string());
        let store = Arc::new(InMemoryStore::new());
        let aggregator = aggregator(Arc::new(provider), store.clone());

        let result = aggregator.get_catchment_data("42", false).await;

        assert!(result.is_err());
        assert!(!store.contains("mike:catchmentdata:42").await);
    }

    #[tokio::test]
    async fn test_station_with_null_data_is_skipped() {
        let mut provider = catchment_42();
        provider
            .series
            .insert("42/A".to_string(), json!({"Name": "A", "Data": null}));
        let store = Arc::new(InMemoryStore::new());
        let aggregator = aggregator(Arc::new(provider), store.clone());

        let first = aggregator.get_catchment_data("42", false).await.unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first.features[0].station_id().as_deref(), Some("B"));

        // A fresh build over the cached station payloads still succeeds
        let rebuilt = aggregator.get_catchment_data("42", true).await.unwrap().unwrap();
        assert_eq!(first, rebuilt);
    }

    #[tokio::test]
    async fn test_undecodable_station_payload_is_skipped() {
        let mut provider = catchment_42();
        provider
            .series
            .insert("42/A".to_string(), json!("maintenance window"));
        let store = Arc::new(InMemoryStore::new());
        let aggregator = aggregator(Arc::new(provider), store.clone());

        let data = aggregator.get_catchment_data("42", false).await.unwrap().unwrap();

        assert_eq!(data.len(), 1);
        assert!(store.contains("mike:catchmentdata:42").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_station_fetches_run_concurrently() {
        let mut provider = FakeProvider {
            series_delay: Duration::from_secs(1),
            ..Default::default()
        };
        let ids = ["A", "B", "C", "D", "E"];
        provider.stations.insert(
            "9".to_string(),
            json!({"type": "FeatureCollection", "features": ids.map(station)}),
        );
        for id in ids {
            provider.series.insert(
                format!("9/{}", id),
                json!({"Name": id, "Data": [["2099-01-01T00:00:00Z", 1.0]]}),
            );
        }
        let provider = Arc::new(provider);
        let aggregator = aggregator(provider.clone(), Arc::new(InMemoryStore::new()));

        let started = tokio::time::Instant::now();
        let data = aggregator.get_catchment_data("9", false).await.unwrap().unwrap();
        let elapsed = started.elapsed();

        assert_eq!(data.len(), 5);
        assert_eq!(provider.series_calls.load(Ordering::SeqCst), 5);
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(2), "fetches ran one after another: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_zero_surviving_stations_is_still_cached() {
        let mut provider = catchment_42();
        provider.series.remove("42/B");
        let store = Arc::new(InMemoryStore::new());
        let aggregator = aggregator(Arc::new(provider), store.clone());

        let data = aggregator.get_catchment_data("42", false).await.unwrap().unwrap();

        assert!(data.is_empty());
        assert_eq!(
            store.get("mike:catchmentdata:42").await.unwrap().as_deref(),
            Some(r#"{"type":"FeatureCollection","features":[]}"#)
        );
    }

    #[tokio::test]
    async fn test_simple_reads_use_kind_scoped_keys() {
        let store = Arc::new(InMemoryStore::new());
        let aggregator = aggregator(Arc::new(catchment_42()), store.clone());

        assert_eq!(aggregator.list_catchment_ids().await.unwrap(), json!(["42", "43"]));

        let ids = vec!["2".to_string(), "1".to_string()];
        let details = aggregator.get_catchment_details(&ids).await.unwrap();
        assert_eq!(details["asOf"], "2000-01-01T000000");

        assert!(store.contains("mike:catchmentids").await);
        assert!(store.contains("mike:catchmentdetails:2$1").await);
        assert!(!store.contains("mike:catchmentdetails:1$2").await);
    }
}
