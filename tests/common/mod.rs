//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use catchment_cache::app::{
    CacheAsideResolver, CatchmentAggregator, ConfigSelector, DataProvider, InMemoryStore,
    SelectorTemplate,
};
use catchment_cache::errors::{ProviderError, ProviderResult};

/// In-process provider serving canned payloads and counting calls
#[derive(Default)]
pub struct MockProvider {
    template: SelectorTemplate,
    pub catchment_ids: Value,
    pub stations: HashMap<String, Value>,
    pub series: HashMap<String, Value>,
    pub failing_series: Option<String>,
    pub id_list_calls: AtomicUsize,
    pub details_calls: AtomicUsize,
    pub station_list_calls: AtomicUsize,
    pub series_calls: AtomicUsize,
}

impl MockProvider {
    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataProvider for MockProvider {
    async fn list_feature_collection(&self, _kind: &str) -> ProviderResult<Value> {
        self.id_list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.catchment_ids.clone())
    }

    async fn get_feature_type_info(&self, ids: &[String], _as_of: &str) -> ProviderResult<Value> {
        self.details_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!(ids
            .iter()
            .map(|id| json!({"id": id, "name": format!("Catchment {}", id)}))
            .collect::<Vec<_>>()))
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
        if self.failing_series.as_deref() == Some(selector.id()) {
            return Err(ProviderError::ServerError {
                status: 502,
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

pub fn station(id: &str) -> Value {
    json!({
        "type": "Feature",
        "geometry": {"type": "Point", "coordinates": [10.2, 56.1]},
        "properties": {"spreadsheetitemid": id, "name": format!("Station {}", id)}
    })
}

/// Catchment 42: station A only has past data, station B forecasts ahead
pub fn catchment_42() -> MockProvider {
    let mut provider = MockProvider {
        catchment_ids: json!(["42", "43"]),
        ..Default::default()
    };
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
        json!({
            "Name": "B",
            "Data": [["2001-06-01T00:00:00Z", 4.9], ["2099-01-01T00:00:00Z", 5.3]],
            "Metadata": {"unit": "m"}
        }),
    );
    provider
}

pub fn aggregator(
    provider: Arc<MockProvider>,
    store: Arc<InMemoryStore>,
    ttl: Duration,
) -> CatchmentAggregator {
    CatchmentAggregator::new(CacheAsideResolver::new(store, ttl), provider)
}

/// Poll `condition` every `step` until it holds
pub async fn wait_until<F, Fut>(step: Duration, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..1000 {
        if condition().await {
            return;
        }
        tokio::time::sleep(step).await;
    }
    panic!("condition not reached");
}
