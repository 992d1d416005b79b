//! Common error types for MultiVoc

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for configuration and parameter handling
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading or validating driver configuration
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file exists but is not valid TOML for our schema
    #[error("Failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration loading or resolution error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A parameter is outside its valid range
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParam { name: &'static str, reason: String },
}
