//! CLI utilities for binaries
//!
//! Handles configuration path resolution and command line arguments.

use std::path::PathBuf;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Ledger configuration (config/ledger.yaml)
    Ledger,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Ledger => "config/ledger.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        match self {
            ConfigType::Ledger => "LEDGER_CONFIG_PATH",
            ConfigType::Custom(_) => "CONFIG_PATH",
        }
    }

    /// Pick the config from the first CLI argument, if any
    pub fn from_args(args: &[String], fallback: ConfigType) -> ConfigType {
        match args.first() {
            Some(path) if !path.trim().is_empty() => ConfigType::Custom(path.clone()),
            _ => fallback,
        }
    }
}

/// Load configuration path from environment or use default
///
/// # Examples
/// ```
/// use ledger_sync::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Ledger);
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    if let ConfigType::Custom(path) = &config_type {
        return PathBuf::from(path);
    }
    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}
