//! Command-line argument parsing for the catchment cache
//!
//! This module defines the CLI structure using clap derive macros: a `serve`
//! command running the expiration-driven refresh loop, one command per cached
//! read, and configuration management.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Catchment Cache - read-through cache for hydrological forecast data
#[derive(Parser, Debug)]
#[command(
    name = "catchment_cache",
    version,
    about = "Read-through cache for catchment, station and forecast time-series data",
    long_about = "Caches catchment listings, station lists and station time series from the hydrological
data provider in Redis, and rebuilds per-catchment forecast aggregates as soon as they expire."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (trace level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use an in-process store instead of Redis (development only)
    #[arg(long, global = true)]
    pub memory_store: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Listen for expired aggregates and rebuild them until interrupted
    Serve,

    /// List all catchment ids
    Catchments,

    /// Show details for one or more catchments
    Details {
        /// Catchment ids, in request order
        #[arg(required = true, value_name = "ID")]
        ids: Vec<String>,
    },

    /// List the stations of a catchment
    Stations {
        /// Catchment id
        #[arg(value_name = "CATCHMENT")]
        catchment: String,
    },

    /// Show the time series of one station
    StationData {
        /// Catchment id
        #[arg(value_name = "CATCHMENT")]
        catchment: String,

        /// Station id within the catchment
        #[arg(value_name = "STATION")]
        station: String,
    },

    /// Show the aggregate of upcoming station data for a catchment
    CatchmentData {
        /// Catchment id
        #[arg(value_name = "CATCHMENT")]
        catchment: String,

        /// Rebuild from the provider even if a cached aggregate exists
        #[arg(long)]
        bypass_cache: bool,
    },

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log level requested by flags, if any
    ///
    /// Without a flag the configured level applies.
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::WARN)
        } else if self.global.very_verbose {
            Some(tracing::Level::TRACE)
        } else if self.global.verbose {
            Some(tracing::Level::DEBUG)
        } else {
            None
        }
    }
}
