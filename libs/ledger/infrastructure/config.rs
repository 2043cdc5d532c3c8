//! Ledger configuration
//!
//! Endpoints come from a YAML file; `.env` and the process environment can
//! override them. Timing behavior (backoff, flush cadence, highlight TTL) is
//! fixed in code and not configurable.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

pub const ENV_API_BASE: &str = "LEDGER_API_BASE";
pub const ENV_BOOK_WS: &str = "LEDGER_BOOK_WS";
pub const ENV_PRICE_WS: &str = "LEDGER_PRICE_WS";
pub const ENV_TAP_WS: &str = "LEDGER_TAP_WS";
pub const ENV_WALLET: &str = "LEDGER_WALLET";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub api: ApiConfig,
    pub streams: StreamsConfig,
    /// Wallet-scope filter for the display feed
    #[serde(default)]
    pub wallet: Option<String>,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Row cap for the startup snapshot
    #[serde(default = "default_snapshot_limit")]
    pub snapshot_limit: usize,
    /// Path of the order mutation endpoint, relative to `base_url`
    #[serde(default = "default_order_path")]
    pub order_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamsConfig {
    pub book_url: String,
    pub price_url: String,
    pub tap_url: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_snapshot_limit() -> usize {
    1000
}

fn default_order_path() -> String {
    "/rec".to_string()
}

impl LedgerConfig {
    /// Load from YAML, apply `.env` and environment overrides, validate
    pub fn from_file(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config = Self::from_yaml_str(&yaml_content)?;

        dotenv::dotenv().ok(); // Don't fail if .env doesn't exist
        config.apply_overrides(|key| std::env::var(key).ok());

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Replace endpoints with any values `lookup` knows about
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base) = get(ENV_API_BASE) {
            info!("Overriding API base URL from {}", ENV_API_BASE);
            self.api.base_url = base;
        }
        if let Some(url) = get(ENV_BOOK_WS) {
            info!("Overriding book stream URL from {}", ENV_BOOK_WS);
            self.streams.book_url = url;
        }
        if let Some(url) = get(ENV_PRICE_WS) {
            info!("Overriding price stream URL from {}", ENV_PRICE_WS);
            self.streams.price_url = url;
        }
        if let Some(url) = get(ENV_TAP_WS) {
            info!("Overriding tap stream URL from {}", ENV_TAP_WS);
            self.streams.tap_url = url;
        }
        if let Some(wallet) = get(ENV_WALLET) {
            self.wallet = Some(wallet);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let base = self.api.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            )));
        }

        if self.api.snapshot_limit == 0 {
            return Err(ConfigError::ValidationError(
                "api.snapshot_limit must be greater than 0".to_string(),
            ));
        }

        for (name, url) in [
            ("streams.book_url", &self.streams.book_url),
            ("streams.price_url", &self.streams.price_url),
            ("streams.tap_url", &self.streams.tap_url),
        ] {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be a ws:// or wss:// URL, got '{}'",
                    name, url
                )));
            }
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  API base URL: {}", self.api.base_url);
        info!("  Snapshot limit: {}", self.api.snapshot_limit);
        info!("  Book stream: {}", self.streams.book_url);
        info!("  Price stream: {}", self.streams.price_url);
        info!("  Tap stream: {}", self.streams.tap_url);
        info!("  Wallet filter: {}", self.wallet.as_deref().unwrap_or("(none)"));
        info!("  Log level: {}", self.log_level);
    }
}
