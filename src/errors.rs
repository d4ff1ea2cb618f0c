//! Error types for the catchment cache
//!
//! This module defines error types for all components of the application.
//! Errors are designed to be actionable and provide clear context for debugging and
//! user feedback.

use std::path::PathBuf;
use thiserror::Error;

/// Key-value store and expiration subscription errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Redis command or connection failure
    #[error("Redis operation failed")]
    Redis(#[from] redis::RedisError),

    /// Value could not be serialized for storage
    #[error("Failed to serialize value for key {key}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// TTL must be at least one second for the backend
    #[error("Invalid TTL for key {key}: TTL must be greater than zero")]
    InvalidTtl { key: String },

    /// The expiration subscription ended
    #[error("Expiration subscription closed")]
    SubscriptionClosed,
}

/// Upstream data provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    /// HTTP request error
    #[error("Provider HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Invalid URL built from configuration or identifiers
    #[error("Invalid provider URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Provider returned an error status
    #[error("Provider error: HTTP {status} for {endpoint}")]
    ServerError { status: u16, endpoint: String },

    /// Provider payload did not have the expected shape
    #[error("Unexpected provider payload for {context}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be rendered
    #[error("Failed to render configuration")]
    Render(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<String> },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Provider error
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Provider(ProviderError::Http(_)) => true,
            AppError::Provider(ProviderError::ServerError { status, .. }) => {
                *status == 429 || *status >= 500
            }
            AppError::Store(StoreError::Redis(e)) => {
                e.is_io_error() || e.is_connection_dropped() || e.is_timeout()
            }
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Store(_) => "store",
            AppError::Provider(_) => "provider",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Store result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Provider result type alias
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
