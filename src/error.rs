//! Error types for the query engine

use thiserror::Error;

use crate::query::error::QueryError;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// Query construction or execution error
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Search backend error
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Search backend errors
#[derive(Error, Debug)]
pub enum BackendError {
    /// Transport failure reaching the backend
    #[error("Transport failure: {0}")]
    Transport(String),

    /// One sub-query of a batched request failed
    #[error("Sub-query {index} failed: {message}")]
    SubQuery {
        /// Position of the failed sub-query within the batch
        index: usize,
        /// Backend-reported failure reason
        message: String,
    },

    /// Backend returned a response this client cannot interpret
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {reason}")]
    Read {
        /// Path of the config file
        path: String,
        /// Underlying IO failure
        reason: String,
    },

    /// Config file could not be parsed as TOML
    #[error("Failed to parse config file {path}: {reason}")]
    Parse {
        /// Path of the config file
        path: String,
        /// TOML parse failure
        reason: String,
    },

    /// Configuration values failed validation
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;
