//! Command handlers for the catchment cache CLI
//!
//! This module wires configuration into a store, a provider and the
//! aggregator, then runs the requested command against them.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::app::{
    create_shutdown_channel, station_path, CacheAsideResolver, CatchmentAggregator,
    ExpirationNotifier, HttpDataProvider, InMemoryStore, KeyValueStore, RedisExpirationNotifier,
    RedisStore, RefreshCoordinator, SignalHandler,
};
use crate::cli::{Commands, ConfigAction};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Store, provider and aggregator built from configuration
pub struct Services {
    pub aggregator: Arc<CatchmentAggregator>,
    pub notifier: Arc<dyn ExpirationNotifier>,
}

/// Connect the store and build the provider and aggregator
///
/// With `memory_store` set, an in-process store stands in for Redis. It
/// forgets everything on exit and only sees its own expirations.
pub async fn build_services(config: &AppConfig, memory_store: bool) -> Result<Services> {
    let (store_config, provider_config, _) = config.to_runtime_config();

    let (store, notifier): (Arc<dyn KeyValueStore>, Arc<dyn ExpirationNotifier>) =
        if memory_store {
            warn!("Using in-memory store; cached values are lost on exit");
            let store = Arc::new(InMemoryStore::new());
            let notifier: Arc<dyn ExpirationNotifier> = store.clone();
            let store: Arc<dyn KeyValueStore> = store;
            (store, notifier)
        } else {
            let store = RedisStore::connect(&store_config).await?;
            let notifier: Arc<dyn ExpirationNotifier> =
                Arc::new(RedisExpirationNotifier::new(&store_config)?);
            let store: Arc<dyn KeyValueStore> = Arc::new(store);
            (store, notifier)
        };

    let provider = Arc::new(HttpDataProvider::new(&provider_config)?);
    let resolver = CacheAsideResolver::new(store, store_config.default_ttl)
        .with_single_flight(config.resolver.single_flight);
    let aggregator = CatchmentAggregator::new(resolver, provider)
        .with_namespace(store_config.key_namespace.clone())
        .with_details_as_of(provider_config.details_as_of.clone());

    Ok(Services {
        aggregator: Arc::new(aggregator),
        notifier,
    })
}

/// Handle the serve command
///
/// Runs the refresh coordinator until Ctrl+C or SIGTERM.
pub async fn handle_serve(services: Services, config: &AppConfig) -> Result<()> {
    let (_, _, refresh_config) = config.to_runtime_config();
    let coordinator = RefreshCoordinator::new(services.aggregator, services.notifier, refresh_config);

    let (shutdown_tx, _) = create_shutdown_channel();
    let signals = SignalHandler::new(shutdown_tx.clone()).setup();

    info!("Listening for expired catchment aggregates");
    let stats = coordinator.run(shutdown_tx).await;
    signals.abort();

    let stats = stats?;
    println!("Refresh summary: {}", stats.summary());
    Ok(())
}

/// Run a read command and return its JSON result
pub async fn handle_read(aggregator: &CatchmentAggregator, command: Commands) -> Result<Value> {
    match command {
        Commands::Catchments => aggregator.list_catchment_ids().await,
        Commands::Details { ids } => aggregator.get_catchment_details(&ids).await,
        Commands::Stations { catchment } => aggregator.get_catchment_stations(&catchment).await,
        Commands::StationData { catchment, station } => {
            aggregator
                .get_station_data(&station_path(&catchment, &station))
                .await
        }
        Commands::CatchmentData {
            catchment,
            bypass_cache,
        } => {
            let aggregate = aggregator
                .get_catchment_data(&catchment, bypass_cache)
                .await?;
            serde_json::to_value(aggregate)
                .map_err(|e| AppError::generic(format!("Failed to render aggregate: {}", e)))
        }
        Commands::Serve | Commands::Config(_) => {
            Err(AppError::generic("Not a read command"))
        }
    }
}

/// Print a JSON value for humans
pub fn print_json(value: &Value) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::generic(format!("Failed to render output: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}

/// Handle `config show`
pub fn handle_config_show(config: &AppConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

/// Handle `config init`
///
/// Writes to `--config` when given, otherwise to the per-user config path.
pub async fn handle_config_init(target: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match target {
        Some(path) => path,
        None => AppConfig::default_config_path()
            .ok_or_else(|| AppError::generic("Could not determine a config directory"))?,
    };

    AppConfig::write_default(&path, force).await?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Dispatch a configuration action
pub async fn handle_config(
    action: ConfigAction,
    target: Option<PathBuf>,
    config: &AppConfig,
) -> Result<()> {
    match action {
        ConfigAction::Show => handle_config_show(config),
        ConfigAction::Init { force } => handle_config_init(target, force).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::app::{ConfigSelector, DataProvider, SelectorTemplate};
    use crate::errors::ProviderResult;

    struct StaticProvider {
        template: SelectorTemplate,
    }

    #[async_trait]
    impl DataProvider for StaticProvider {
        async fn list_feature_collection(&self, _kind: &str) -> ProviderResult<Value> {
            Ok(json!(["1", "2"]))
        }

        async fn get_feature_type_info(
            &self,
            ids: &[String],
            _as_of: &str,
        ) -> ProviderResult<Value> {
            Ok(json!(ids))
        }

        async fn list_features(&self, _selector: &ConfigSelector) -> ProviderResult<Value> {
            Ok(Value::Null)
        }

        async fn list_time_series(&self, _selector: &ConfigSelector) -> ProviderResult<Value> {
            Ok(Value::Null)
        }

        fn selector_template(&self) -> &SelectorTemplate {
            &self.template
        }
    }

    fn aggregator() -> CatchmentAggregator {
        let store = Arc::new(InMemoryStore::new());
        let provider = Arc::new(StaticProvider {
            template: SelectorTemplate::default(),
        });
        CatchmentAggregator::new(CacheAsideResolver::new(store, Duration::from_secs(60)), provider)
    }

    #[tokio::test]
    async fn test_read_commands() {
        let aggregator = aggregator();

        let ids = handle_read(&aggregator, Commands::Catchments).await.unwrap();
        assert_eq!(ids, json!(["1", "2"]));

        let details = handle_read(
            &aggregator,
            Commands::Details {
                ids: vec!["2".to_string(), "1".to_string()],
            },
        )
        .await
        .unwrap();
        assert_eq!(details, json!(["2", "1"]));
    }

    #[tokio::test]
    async fn test_unknown_catchment_renders_null() {
        let aggregator = aggregator();

        let value = handle_read(
            &aggregator,
            Commands::CatchmentData {
                catchment: "404".to_string(),
                bypass_cache: false,
            },
        )
        .await
        .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_serve_is_not_a_read() {
        let aggregator = aggregator();
        assert!(handle_read(&aggregator, Commands::Serve).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_services() {
        let services = build_services(&AppConfig::default(), true).await.unwrap();
        assert_eq!(services.aggregator.namespace(), "mike");
        assert!(services.aggregator.resolver().single_flight());
    }

    #[tokio::test]
    async fn test_config_init_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catchment-cache.toml");

        handle_config_init(Some(path.clone()), false).await.unwrap();
        assert!(path.exists());
        assert!(handle_config_init(Some(path), false).await.is_err());
    }
}
