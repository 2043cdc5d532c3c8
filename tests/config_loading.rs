//! Integration test: Configuration utilities
//!
//! Tests the bin_common path resolution against the shipped ledger config.

use ledger_sync::bin_common::{load_config_from_env, ConfigType};
use ledger_sync::ledger::LedgerConfig;
use std::env;

#[test]
fn test_ledger_config_default_path() {
    env::remove_var("LEDGER_CONFIG_PATH");

    let config_path = load_config_from_env(ConfigType::Ledger);
    assert_eq!(config_path.to_str().unwrap(), "config/ledger.yaml");
}

#[test]
fn test_custom_config_ignores_env() {
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    let config_path = load_config_from_env(custom);

    assert_eq!(config_path.to_str().unwrap(), "custom/path.yaml");
}

#[test]
fn test_config_type_env_var_names() {
    assert_eq!(ConfigType::Ledger.env_var_name(), "LEDGER_CONFIG_PATH");
    assert_eq!(
        ConfigType::Custom("x.yaml".to_string()).env_var_name(),
        "CONFIG_PATH"
    );
}

#[test]
fn test_shipped_config_parses() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/ledger.yaml");
    let yaml = std::fs::read_to_string(path).unwrap();

    let config = LedgerConfig::from_yaml_str(&yaml).unwrap();
    config.validate().unwrap();
    assert_eq!(config.api.snapshot_limit, 1000);
    assert_eq!(config.api.order_path, "/rec");
    assert!(config.wallet.is_none());
    assert!(config.streams.book_url.starts_with("wss://"));
}
