//! Upstream data provider
//!
//! The provider serves the catchment → station → time-series hierarchy as
//! JSON. The cache layer treats it as an opaque capability behind the
//! [`DataProvider`] trait; [`HttpDataProvider`] is the production client.
//!
//! - `config`: HTTP client configuration and building
//! - `selector`: configuration selector strings addressing entities
//! - `http`: reqwest-backed implementation

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ProviderResult;

pub mod config;
pub mod http;
pub mod selector;

pub use config::ProviderConfig;
pub use http::HttpDataProvider;
pub use selector::{ConfigSelector, SelectorTemplate};

/// Source of raw catchment, station and time-series payloads
///
/// Every operation returns the provider's JSON as-is. `Value::Null` means
/// the provider had nothing for the request, which is not an error.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// List a feature collection by kind (e.g. all catchment ids)
    async fn list_feature_collection(&self, kind: &str) -> ProviderResult<Value>;

    /// Fetch type information for the given ids, in order, as of `as_of`
    async fn get_feature_type_info(&self, ids: &[String], as_of: &str) -> ProviderResult<Value>;

    /// List the features addressed by `selector`
    async fn list_features(&self, selector: &ConfigSelector) -> ProviderResult<Value>;

    /// List the time series addressed by `selector`
    async fn list_time_series(&self, selector: &ConfigSelector) -> ProviderResult<Value>;

    /// Selector template used to address entities
    fn selector_template(&self) -> &SelectorTemplate;
}
