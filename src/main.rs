//! Catchment Cache CLI application
//!
//! Serves cached catchment, station and time-series reads and keeps
//! per-catchment forecast aggregates warm by rebuilding them on expiry.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use catchment_cache::cli::{
    build_services, handle_config, handle_config_init, handle_read, handle_serve, print_json, Cli,
    Commands, ConfigAction, ConfigArgs,
};
use catchment_cache::config::AppConfig;
use catchment_cache::constants::logging::DEFAULT_LOG_LEVEL;
use catchment_cache::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    // `config init` must work even when the existing file does not parse
    if let Commands::Config(ConfigArgs {
        action: ConfigAction::Init { force },
    }) = cli.command
    {
        init_logging(&cli, DEFAULT_LOG_LEVEL);
        return handle_config_init(cli.global.config.clone(), force).await;
    }

    let config = AppConfig::load(cli.global.config.clone()).await?;
    init_logging(&cli, &config.logging.level);

    info!("Catchment Cache v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Config(args) => handle_config(args.action, cli.global.config, &config).await,
        Commands::Serve => {
            info!("Executing serve command");
            let services = build_services(&config, cli.global.memory_store).await?;
            handle_serve(services, &config).await
        }
        command => {
            let services = build_services(&config, cli.global.memory_store).await?;
            let value = handle_read(&services.aggregator, command).await?;
            print_json(&value)
        }
    }
}

/// Initialize logging from CLI flags, falling back to the configured level
fn init_logging(cli: &Cli, configured_level: &str) {
    let level = cli
        .log_level()
        .map(|level| level.to_string().to_lowercase())
        .unwrap_or_else(|| configured_level.to_string());

    let mut filter = EnvFilter::from_default_env();
    match format!("catchment_cache={}", level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log level '{}': {}", level, e),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
