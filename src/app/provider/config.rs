//! Provider client configuration and building logic
//!
//! This module handles the configuration and construction of the HTTP client
//! used to reach the upstream data provider.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::selector::SelectorTemplate;
use crate::constants::provider;
use crate::errors::{ProviderError, ProviderResult};

/// Configuration for the upstream data provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL every endpoint path is joined onto
    pub base_url: String,
    /// Request timeout
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Connection pool idle timeout
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// Fixed selector fields
    pub selector: SelectorTemplate,
    /// Reference date sent with catchment detail requests
    pub details_as_of: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: provider::DEFAULT_BASE_URL.to_string(),
            request_timeout: provider::DEFAULT_TIMEOUT,
            connect_timeout: provider::CONNECT_TIMEOUT,
            pool_idle_timeout: Some(provider::POOL_IDLE_TIMEOUT),
            pool_max_per_host: provider::POOL_MAX_PER_HOST,
            selector: SelectorTemplate::default(),
            details_as_of: provider::DEFAULT_DETAILS_AS_OF.to_string(),
        }
    }
}

impl ProviderConfig {
    /// Set the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builds the HTTP client with the specified configuration
    pub fn build_http_client(&self) -> ProviderResult<Client> {
        let mut client_builder = Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(provider::USER_AGENT)
            .pool_max_idle_per_host(self.pool_max_per_host);

        if let Some(idle_timeout) = self.pool_idle_timeout {
            client_builder = client_builder.pool_idle_timeout(idle_timeout);
        }

        client_builder.build().map_err(ProviderError::Http)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err("Provider base URL cannot be empty".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("Provider request timeout cannot be zero".to_string());
        }

        Ok(())
    }
}
