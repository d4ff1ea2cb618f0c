//! Configuration management for the catchment cache
//!
//! Configuration is assembled from three sources, later ones winning:
//! built-in defaults, a TOML file, and the environment variables the service
//! has always been deployed with (`REDIS_URL`, `REDIS_DB_NO`, `CACHE_TTL`,
//! `MIKE_API_URL`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::provider::{ProviderConfig, SelectorTemplate};
use crate::app::store::config::normalize_url;
use crate::app::{RefreshConfig, StoreConfig};
use crate::constants::{env, logging, provider, refresh, store};
use crate::errors::{AppError, ConfigError, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Key-value store settings
    pub store: StoreConfigToml,
    /// Upstream provider settings
    pub provider: ProviderConfigToml,
    /// Cache-aside resolver settings
    pub resolver: ResolverConfigToml,
    /// Expiration-driven refresh settings
    pub refresh: RefreshConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfigToml {
    /// Connection target; a bare port is accepted
    pub url: String,
    /// Logical database index
    pub db: u32,
    /// TTL of cached entries in seconds
    pub default_ttl_secs: u64,
    /// Namespace prefix of every key
    pub key_namespace: String,
    /// Issue `CONFIG SET notify-keyspace-events Ex` at startup
    pub configure_keyspace_events: bool,
}

impl Default for StoreConfigToml {
    fn default() -> Self {
        Self {
            url: store::DEFAULT_REDIS_URL.to_string(),
            db: store::DEFAULT_DB_INDEX,
            default_ttl_secs: store::DEFAULT_TTL_SECS,
            key_namespace: store::KEY_NAMESPACE.to_string(),
            configure_keyspace_events: false,
        }
    }
}

/// TOML-friendly provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfigToml {
    /// Base URL of the provider API
    pub base_url: String,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// Selector template fields
    pub configuration_name: String,
    pub theme_id: String,
    pub observation_period: String,
    pub observation_period_offset: String,
    /// Reference date sent with catchment detail requests
    pub details_as_of: String,
}

impl Default for ProviderConfigToml {
    fn default() -> Self {
        Self {
            base_url: provider::DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: provider::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout_secs: provider::CONNECT_TIMEOUT.as_secs(),
            pool_max_per_host: provider::POOL_MAX_PER_HOST,
            configuration_name: provider::DEFAULT_CONFIGURATION_NAME.to_string(),
            theme_id: provider::DEFAULT_THEME_ID.to_string(),
            observation_period: provider::DEFAULT_OBSERVATION_PERIOD.to_string(),
            observation_period_offset: provider::DEFAULT_OBSERVATION_PERIOD_OFFSET.to_string(),
            details_as_of: provider::DEFAULT_DETAILS_AS_OF.to_string(),
        }
    }
}

/// TOML-friendly resolver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfigToml {
    /// Collapse concurrent misses for one key into a single computation
    pub single_flight: bool,
}

impl Default for ResolverConfigToml {
    fn default() -> Self {
        Self {
            single_flight: true,
        }
    }
}

/// TOML-friendly refresh configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfigToml {
    /// Delay between refresh attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Capacity of the refresh work queue
    pub queue_capacity: usize,
    /// Shutdown timeout in seconds
    pub shutdown_timeout_secs: u64,
}

impl Default for RefreshConfigToml {
    fn default() -> Self {
        Self {
            retry_delay_ms: refresh::DEFAULT_RETRY_DELAY.as_millis() as u64,
            queue_capacity: refresh::DEFAULT_QUEUE_CAPACITY,
            shutdown_timeout_secs: refresh::DEFAULT_SHUTDOWN_TIMEOUT.as_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> (StoreConfig, ProviderConfig, RefreshConfig) {
        (
            self.store.to_runtime_config(),
            self.provider.to_runtime_config(),
            self.refresh.to_runtime_config(),
        )
    }

    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (explicit, else the first one found)
    /// 3. Environment variables
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::load_file(config_file_override).await?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the config file, without environment overrides
    pub async fn load_file(config_file_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path }.into());
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        match config_path {
            Some(path) => Self::load_from_file(&path).await,
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(env::REDIS_URL) {
            self.store.url = normalize_url(&url);
        }

        if let Some(db) = lookup(env::REDIS_DB_NO) {
            self.store.db = parse_env(env::REDIS_DB_NO, &db)?;
        }

        if let Some(ttl) = lookup(env::CACHE_TTL) {
            self.store.default_ttl_secs = parse_env(env::CACHE_TTL, &ttl)?;
        }

        if let Some(base_url) = lookup(env::PROVIDER_URL) {
            self.provider.base_url = base_url.trim().to_string();
        }

        Ok(())
    }

    /// Validate every section, reporting all problems at once
    pub fn validate(&self) -> Result<()> {
        let (store, provider, refresh) = self.to_runtime_config();

        let errors: Vec<String> = [store.validate(), provider.validate(), refresh.validate()]
            .into_iter()
            .filter_map(|result| result.err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed { errors }.into())
        }
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self).map_err(ConfigError::from)?)
    }

    /// Write the default commented configuration file
    ///
    /// Refuses to overwrite an existing file unless `force` is set.
    pub async fn write_default(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(AppError::generic(format!(
                "Config file already exists: {} (use --force to overwrite)",
                path.display()
            )));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(path, Self::generate_default_config_content()).await?;
        info!("Wrote default configuration to {}", path.display());
        Ok(())
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from("./catchment-cache.toml")];
        if let Some(path) = Self::default_config_path() {
            search_paths.push(path);
        }

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Some(path);
            }
        }

        None
    }

    /// Per-user config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("catchment-cache").join("config.toml"))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::from)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# Catchment Cache Configuration
# Environment variables REDIS_URL, REDIS_DB_NO, CACHE_TTL and MIKE_API_URL
# override the matching settings below.

[store]
# Redis connection target; a bare port such as "6379" means localhost
url = "{redis_url}"
# Logical database index (expiry events are read from the same database)
db = {db}
# Time-to-live of cached entries in seconds (12 hours)
default_ttl_secs = {ttl}
key_namespace = "{namespace}"
# Enable expired-key notifications on the server at startup
configure_keyspace_events = false

[provider]
base_url = "{base_url}"
request_timeout_secs = {request_timeout}
connect_timeout_secs = {connect_timeout}
pool_max_per_host = {pool_max}
# Selector template sent with every station and time-series request
configuration_name = "{configuration_name}"
theme_id = "{theme_id}"
observation_period = "{observation_period}"
observation_period_offset = "{observation_period_offset}"
details_as_of = "{details_as_of}"

[resolver]
# Collapse concurrent cache misses for one key into one upstream call
single_flight = true

[refresh]
# Fixed delay between attempts of a failing refresh; refreshes never give up
retry_delay_ms = {retry_delay}
queue_capacity = {queue_capacity}
shutdown_timeout_secs = {shutdown_timeout}

[logging]
level = "{level}"  # error, warn, info, debug, trace
"#,
            redis_url = store::DEFAULT_REDIS_URL,
            db = store::DEFAULT_DB_INDEX,
            ttl = store::DEFAULT_TTL_SECS,
            namespace = store::KEY_NAMESPACE,
            base_url = provider::DEFAULT_BASE_URL,
            request_timeout = provider::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout = provider::CONNECT_TIMEOUT.as_secs(),
            pool_max = provider::POOL_MAX_PER_HOST,
            configuration_name = provider::DEFAULT_CONFIGURATION_NAME,
            theme_id = provider::DEFAULT_THEME_ID,
            observation_period = provider::DEFAULT_OBSERVATION_PERIOD,
            observation_period_offset = provider::DEFAULT_OBSERVATION_PERIOD_OFFSET,
            details_as_of = provider::DEFAULT_DETAILS_AS_OF,
            retry_delay = refresh::DEFAULT_RETRY_DELAY.as_millis(),
            queue_capacity = refresh::DEFAULT_QUEUE_CAPACITY,
            shutdown_timeout = refresh::DEFAULT_SHUTDOWN_TIMEOUT.as_secs(),
            level = logging::DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        ConfigError::InvalidValue {
            field: name.to_string(),
            value: raw.to_string(),
            reason: "Expected a non-negative integer".to_string(),
        }
        .into()
    })
}

impl StoreConfigToml {
    /// Convert to runtime StoreConfig
    pub fn to_runtime_config(&self) -> StoreConfig {
        StoreConfig {
            url: normalize_url(&self.url),
            db: self.db,
            default_ttl: Duration::from_secs(self.default_ttl_secs),
            key_namespace: self.key_namespace.clone(),
            configure_keyspace_events: self.configure_keyspace_events,
        }
    }
}

impl ProviderConfigToml {
    /// Convert to runtime ProviderConfig
    pub fn to_runtime_config(&self) -> ProviderConfig {
        ProviderConfig {
            base_url: self.base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            pool_idle_timeout: Some(provider::POOL_IDLE_TIMEOUT),
            pool_max_per_host: self.pool_max_per_host,
            selector: SelectorTemplate {
                configuration_name: self.configuration_name.clone(),
                theme_id: self.theme_id.clone(),
                observation_period: self.observation_period.clone(),
                observation_period_offset: self.observation_period_offset.clone(),
            },
            details_as_of: self.details_as_of.clone(),
        }
    }
}

impl RefreshConfigToml {
    /// Convert to runtime RefreshConfig
    pub fn to_runtime_config(&self) -> RefreshConfig {
        RefreshConfig {
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            queue_capacity: self.queue_capacity,
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
        }
    }
}
