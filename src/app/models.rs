//! Data models for catchments, stations and time series
//!
//! Provider payloads are JSON without a schema enforced by the cache layer, so
//! these types only name the fields the aggregation actually reads and carry
//! everything else through untouched.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Property holding a station's identifier
pub const STATION_ID_PROPERTY: &str = "spreadsheetitemid";

/// Property receiving the filtered forecast points
pub const DATA_PROPERTY: &str = "data";

/// Property receiving the provider's time-series metadata
pub const METADATA_PROPERTY: &str = "metadata";

fn feature_collection_type() -> String {
    "FeatureCollection".to_string()
}

/// A GeoJSON-like feature (catchment or station)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Feature properties
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Geometry, type, id and any other provider fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Feature {
    /// Station identifier from the feature properties
    pub fn station_id(&self) -> Option<String> {
        self.properties.get(STATION_ID_PROPERTY).and_then(value_as_id)
    }

    /// Copy of this feature with forecast data and metadata added to its properties
    pub fn with_series(&self, data: Vec<TimeSeriesPoint>, metadata: Value) -> Feature {
        let mut feature = self.clone();
        let data = data.into_iter().map(Value::from).collect();
        feature
            .properties
            .insert(DATA_PROPERTY.to_string(), Value::Array(data));
        if !metadata.is_null() {
            feature
                .properties
                .insert(METADATA_PROPERTY.to_string(), metadata);
        }
        feature
    }
}

/// Collection of features, as returned for station lists and built for aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "feature_collection_type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self {
            kind: feature_collection_type(),
            features: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Find the station whose identifier matches `id`
    pub fn find_station(&self, id: &str) -> Option<&Feature> {
        self.features
            .iter()
            .find(|feature| feature.station_id().as_deref() == Some(id))
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new()
    }
}

fn points_or_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(points) => Ok(points),
        _ => Ok(Vec::new()),
    }
}

/// Time-series response for a single station
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationTimeSeries {
    /// Station identifier this series belongs to
    #[serde(rename = "Name", default)]
    pub name: Option<Value>,
    /// Raw `[timestamp, value]` pairs; `null` or a non-array reads as no data
    #[serde(rename = "Data", default, deserialize_with = "points_or_empty")]
    pub data: Vec<Value>,
    /// Provider-supplied metadata
    #[serde(rename = "Metadata", default)]
    pub metadata: Value,
}

impl StationTimeSeries {
    /// Station identifier as a string
    pub fn station_id(&self) -> Option<String> {
        self.name.as_ref().and_then(value_as_id)
    }

    /// Points whose timestamp is strictly after `now`, in provider order
    pub fn future_points(&self, now: DateTime<Utc>) -> Vec<TimeSeriesPoint> {
        self.data
            .iter()
            .filter_map(TimeSeriesPoint::from_raw)
            .filter(|point| point.is_after(now))
            .collect()
    }
}

/// A single `(time, value)` observation or forecast point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub time: String,
    pub value: Value,
}

impl TimeSeriesPoint {
    /// Build a point from a raw `[timestamp, value]` array
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let pair = raw.as_array()?;
        let time = pair.first()?.as_str()?.to_string();
        let value = pair.get(1).cloned().unwrap_or(Value::Null);
        Some(Self { time, value })
    }

    /// Whether the timestamp parses and lies strictly after `now`
    pub fn is_after(&self, now: DateTime<Utc>) -> bool {
        parse_timestamp(&self.time).is_some_and(|ts| ts > now)
    }
}

impl From<TimeSeriesPoint> for Value {
    fn from(point: TimeSeriesPoint) -> Self {
        let mut map = Map::new();
        map.insert("time".to_string(), Value::String(point.time));
        map.insert("value".to_string(), point.value);
        Value::Object(map)
    }
}

/// Parse a provider timestamp
///
/// Accepts RFC 3339, naive date-times (taken as UTC) and plain dates (UTC
/// midnight).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Render a JSON scalar identifier as a string
pub fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
