//! Configuration loading and config file resolution
//!
//! The file is optional. Resolution order:
//! 1. Explicit path (command-line argument, highest priority)
//! 2. `MVOC_CONFIG` environment variable
//! 3. `<config dir>/mvoc/config.toml`
//! 4. Built-in defaults (no file)
//!
//! An explicitly named file that is missing is an error; the implicit
//! per-user file is only read if it exists.

use crate::params::OutputParams;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "MVOC_CONFIG";

/// Whole configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Output driver parameters (`[output]` table)
    pub output: OutputParams,

    /// Logging configuration (`[logging]` table)
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log filter directive (trace, debug, info, warn, error, or full EnvFilter syntax)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl DriverConfig {
    /// Parse and validate configuration text
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        let config: DriverConfig = toml::from_str(text).map_err(|source| Error::Toml {
            path: origin.to_path_buf(),
            source,
        })?;
        config.output.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text, path)
    }
}

/// Locate the configuration file to use, if any
///
/// # Errors
/// - `Error::Config` if an explicitly requested file (argument or env var) does not exist
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return require_exists(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return require_exists(PathBuf::from(path));
    }

    // Priority 3: Per-user config file, only if present
    if let Some(path) = dirs::config_dir().map(|d| d.join("mvoc").join("config.toml")) {
        if path.exists() {
            return Ok(Some(path));
        }
        debug!("No user config at {}", path.display());
    }

    Ok(None)
}

fn require_exists(path: PathBuf) -> Result<Option<PathBuf>> {
    if path.exists() {
        Ok(Some(path))
    } else {
        Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )))
    }
}

/// Resolve and load the configuration, falling back to built-in defaults
pub fn load_config(cli_arg: Option<&Path>) -> Result<DriverConfig> {
    match resolve_config_path(cli_arg)? {
        Some(path) => {
            let config = DriverConfig::from_file(&path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => {
            debug!("Using built-in configuration defaults");
            Ok(DriverConfig::default())
        }
    }
}
