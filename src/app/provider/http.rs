//! reqwest-backed data provider
//!
//! Maps the four provider operations onto the provider's REST endpoints.
//! No retries happen here: a failed request surfaces to the caller, and the
//! refresh path retries whole aggregates instead.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::config::ProviderConfig;
use super::selector::{ConfigSelector, SelectorTemplate};
use super::DataProvider;
use crate::constants::{provider, store::ID_LIST_SEPARATOR};
use crate::errors::{ProviderError, ProviderResult};

/// HTTP client for the upstream data provider
#[derive(Debug, Clone)]
pub struct HttpDataProvider {
    client: Client,
    base_url: Url,
    selector: SelectorTemplate,
}

impl HttpDataProvider {
    /// Creates a provider client from configuration
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the base URL is invalid or the HTTP client
    /// cannot be built
    pub fn new(config: &ProviderConfig) -> ProviderResult<Self> {
        let client = config.build_http_client()?;
        let base_url = parse_base_url(&config.base_url)?;

        tracing::info!("Created provider client for {}", base_url);

        Ok(Self {
            client,
            base_url,
            selector: config.selector.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join a relative endpoint path onto the base URL
    fn endpoint(&self, path: &str) -> ProviderResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::InvalidUrl {
                url: format!("{}{}", self.base_url, path),
                error: e.to_string(),
            })
    }

    /// Endpoint with extra path segments, each percent-encoded as one segment
    fn endpoint_with_segments(&self, path: &str, segments: &[&str]) -> ProviderResult<Url> {
        let mut url = self.endpoint(path)?;
        let shown = url.to_string();
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidUrl {
                url: shown,
                error: "URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> ProviderResult<Value> {
        debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;
        Self::read_json(response, url.path()).await
    }

    async fn post_json(&self, url: Url, body: &Value) -> ProviderResult<Value> {
        debug!("POST {}", url);
        let response = self.client.post(url.clone()).json(body).send().await?;
        Self::read_json(response, url.path()).await
    }

    async fn read_json(response: Response, endpoint: &str) -> ProviderResult<Value> {
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::ServerError {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|source| ProviderError::Decode {
            context: endpoint.to_string(),
            source,
        })
    }
}

#[async_trait]
impl DataProvider for HttpDataProvider {
    async fn list_feature_collection(&self, kind: &str) -> ProviderResult<Value> {
        let url = self.endpoint_with_segments(provider::TIMESTEP_PATH, &[kind])?;
        self.get_json(url).await
    }

    async fn get_feature_type_info(&self, ids: &[String], as_of: &str) -> ProviderResult<Value> {
        let selector = self
            .selector
            .select_typed(provider::FEATURE_TYPE_INFO, ids.join(ID_LIST_SEPARATOR))
            .to_string();
        let url = self.endpoint_with_segments(
            provider::TIMESTEP_PATH,
            &[selector.as_str(), "data", as_of],
        )?;
        self.get_json(url).await
    }

    async fn list_features(&self, selector: &ConfigSelector) -> ProviderResult<Value> {
        let selector = selector.to_string();
        let url = self.endpoint(provider::FEATURE_LIST_PATH)?;
        let mut body = self
            .post_json(url, &Value::Array(vec![Value::String(selector.clone())]))
            .await?;

        // Response is keyed by the selector that was asked for
        Ok(body
            .get_mut(selector.as_str())
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    async fn list_time_series(&self, selector: &ConfigSelector) -> ProviderResult<Value> {
        let url = self.endpoint(provider::TIMESERIES_LIST_PATH)?;
        let mut body = self
            .post_json(url, &Value::Array(vec![Value::String(selector.to_string())]))
            .await?;

        Ok(body.get_mut(0).map(Value::take).unwrap_or(Value::Null))
    }

    fn selector_template(&self) -> &SelectorTemplate {
        &self.selector
    }
}

/// Parse the base URL, making sure relative joins append to its path
fn parse_base_url(raw: &str) -> ProviderResult<Url> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };

    Url::parse(&with_slash).map_err(|e| ProviderError::InvalidUrl {
        url: raw.to_string(),
        error: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_provider() -> HttpDataProvider {
        let config = ProviderConfig::default().with_base_url("http://provider.test/api");
        HttpDataProvider::new(&config).unwrap()
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = test_provider();
        assert_eq!(client.base_url().as_str(), "http://provider.test/api/");
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ProviderConfig::default().with_base_url("not a url");
        assert!(matches!(
            HttpDataProvider::new(&config),
            Err(ProviderError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_catchment_items_url() {
        let client = test_provider();
        let url = client
            .endpoint_with_segments(provider::TIMESTEP_PATH, &[provider::CATCHMENT_ITEMS_KIND])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://provider.test/api/timestep/mo-timestep/items"
        );
    }

    #[test]
    fn test_feature_type_info_url_keeps_selector_in_one_segment() {
        let client = test_provider();
        let selector = client
            .selector_template()
            .select_typed(provider::FEATURE_TYPE_INFO, "1$2")
            .to_string();
        let url = client
            .endpoint_with_segments(
                provider::TIMESTEP_PATH,
                &[selector.as_str(), "data", provider::DEFAULT_DETAILS_AS_OF],
            )
            .unwrap();

        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segments.len(), 6);
        assert!(segments[3].contains("Type=FeatureTypeInfo;Id=1$2"));
        assert!(segments[3].contains("Water%20Monitoring"));
        assert_eq!(segments[4], "data");
        assert_eq!(segments[5], "2000-01-01T000000");
    }

    #[test]
    fn test_list_endpoints() {
        let client = test_provider();
        assert_eq!(
            client.endpoint(provider::FEATURE_LIST_PATH).unwrap().as_str(),
            "http://provider.test/api/featurecollection/mo-gis/list"
        );
        assert_eq!(
            client
                .endpoint(provider::TIMESERIES_LIST_PATH)
                .unwrap()
                .as_str(),
            "http://provider.test/api/timeseries/mo-timeseries/list"
        );
    }
}
