//! Command-line interface components
//!
//! Argument parsing and the handlers that run each command against the
//! configured store and provider.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, ConfigAction, ConfigArgs, GlobalArgs};
pub use commands::{
    build_services, handle_config, handle_config_init, handle_config_show, handle_read,
    handle_serve, print_json, Services,
};
