//! Configuration management for Soundscape Surface
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.

pub mod watcher;

use crate::processor::{ComsMode, MAX_MAPPING_ID, MAX_SOUNDOBJECT_ID, MIN_MAPPING_ID, MIN_SOUNDOBJECT_ID};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub use watcher::ConfigWatcher;

pub const MIN_REFRESH_INTERVAL_MS: u64 = 10;
pub const MAX_REFRESH_INTERVAL_MS: u64 = 5000;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub processors: Vec<ProcessorConfig>,
    /// Override for the XML state document location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which transport talks to the remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeProtocol {
    Osc,
    /// Log outbound traffic only
    Console,
}

/// Remote device connection configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BridgeConfig {
    #[serde(default = "default_protocol")]
    pub protocol: BridgeProtocol,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Interval between protocol ticks
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Ticks without inbound traffic before the device counts as offline
    #[serde(default = "default_offline_after_ticks")]
    pub offline_after_ticks: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            host: default_host(),
            port: default_port(),
            listen_port: default_listen_port(),
            refresh_interval_ms: default_refresh_interval_ms(),
            offline_after_ticks: default_offline_after_ticks(),
        }
    }
}

impl BridgeConfig {
    /// Whether both configs reach the device through the same transport
    /// and local port
    pub fn same_endpoint(&self, other: &BridgeConfig) -> bool {
        self.protocol == other.protocol
            && self.host == other.host
            && self.port == other.port
            && self.listen_port == other.listen_port
    }

    /// This config with the transport and addresses taken from `other`
    pub fn with_endpoint_of(&self, other: &BridgeConfig) -> BridgeConfig {
        BridgeConfig {
            protocol: other.protocol,
            host: other.host.clone(),
            port: other.port,
            listen_port: other.listen_port,
            ..self.clone()
        }
    }
}

/// One sound object processor to create at startup
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProcessorConfig {
    pub soundobject_id: u16,
    #[serde(default = "default_mapping_id")]
    pub mapping_id: u8,
    #[serde(default)]
    pub coms_mode: ComsMode,
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Also write a daily rolling log file in the logs directory
    #[serde(default)]
    pub file: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            processors: Vec::new(),
            state_file: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        let bridge = &self.bridge;
        if bridge.protocol == BridgeProtocol::Osc && bridge.host.trim().is_empty() {
            anyhow::bail!("bridge host cannot be empty");
        }
        if bridge.port == 0 {
            anyhow::bail!("bridge port cannot be 0");
        }
        if !(MIN_REFRESH_INTERVAL_MS..=MAX_REFRESH_INTERVAL_MS).contains(&bridge.refresh_interval_ms) {
            anyhow::bail!(
                "bridge refresh_interval_ms {} is out of range ({}-{})",
                bridge.refresh_interval_ms,
                MIN_REFRESH_INTERVAL_MS,
                MAX_REFRESH_INTERVAL_MS
            );
        }
        if bridge.offline_after_ticks == 0 {
            anyhow::bail!("bridge offline_after_ticks must be at least 1");
        }

        for (idx, processor) in self.processors.iter().enumerate() {
            if !(MIN_SOUNDOBJECT_ID..=MAX_SOUNDOBJECT_ID).contains(&processor.soundobject_id) {
                anyhow::bail!(
                    "Processor {} has invalid soundobject_id {} (must be {}-{})",
                    idx,
                    processor.soundobject_id,
                    MIN_SOUNDOBJECT_ID,
                    MAX_SOUNDOBJECT_ID
                );
            }
            if !(MIN_MAPPING_ID..=MAX_MAPPING_ID).contains(&processor.mapping_id) {
                anyhow::bail!(
                    "Processor {} has invalid mapping_id {} (must be {}-{})",
                    idx,
                    processor.mapping_id,
                    MIN_MAPPING_ID,
                    MAX_MAPPING_ID
                );
            }
        }

        Ok(())
    }
}

// Default value functions
fn default_protocol() -> BridgeProtocol { BridgeProtocol::Osc }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 50010 }
fn default_listen_port() -> u16 { 50011 }
fn default_refresh_interval_ms() -> u64 { 50 }
fn default_offline_after_ticks() -> u32 { 20 }
fn default_mapping_id() -> u8 { 1 }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_yaml("processors: []\n").unwrap();
        assert_eq!(config.bridge, BridgeConfig::default());
        assert_eq!(config.bridge.port, 50010);
        assert_eq!(config.bridge.refresh_interval_ms, 50);
        assert!(!config.logging.file);
        assert!(config.state_file.is_none());
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
bridge:
  protocol: console
  host: "10.0.0.5"
  refresh_interval_ms: 100
processors:
  - soundobject_id: 3
    mapping_id: 2
    coms_mode: rx
  - soundobject_id: 4
state_file: "/tmp/surface.xml"
logging:
  file: true
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.bridge.protocol, BridgeProtocol::Console);
        assert_eq!(config.bridge.listen_port, 50011);
        assert_eq!(config.processors.len(), 2);
        assert_eq!(config.processors[0].coms_mode, ComsMode::Rx);
        assert_eq!(config.processors[1].mapping_id, 1);
        assert_eq!(config.processors[1].coms_mode, ComsMode::TxRx);
        assert_eq!(config.state_file, Some(PathBuf::from("/tmp/surface.xml")));
        assert!(config.logging.file);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let too_fast = "bridge:\n  refresh_interval_ms: 1\n";
        assert!(AppConfig::from_yaml(too_fast).is_err());

        let bad_object = "processors:\n  - soundobject_id: 0\n";
        let err = AppConfig::from_yaml(bad_object).unwrap_err();
        assert!(format!("{:#}", err).contains("soundobject_id"));

        let bad_mapping = "processors:\n  - soundobject_id: 1\n    mapping_id: 9\n";
        assert!(AppConfig::from_yaml(bad_mapping).is_err());

        let bad_protocol = "bridge:\n  protocol: midi\n";
        assert!(AppConfig::from_yaml(bad_protocol).is_err());
    }

    #[tokio::test]
    async fn test_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.yaml");

        let mut config = AppConfig::default();
        config.processors.push(ProcessorConfig {
            soundobject_id: 12,
            mapping_id: 4,
            coms_mode: ComsMode::Tx,
        });
        config.save(&path).await?;

        let loaded = AppConfig::load(&path).await?;
        assert_eq!(loaded, config);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(AppConfig::load(temp_dir.path().join("nope.yaml")).await.is_err());
    }

    #[test]
    fn test_endpoint_comparison_and_copy() {
        let current = BridgeConfig::default();
        let mut reloaded = current.clone();
        reloaded.refresh_interval_ms = 200;
        assert!(current.same_endpoint(&reloaded));

        reloaded.host = "10.0.0.9".to_string();
        assert!(!current.same_endpoint(&reloaded));

        // Keeps the new rate but falls back to the live address
        let accepted = reloaded.with_endpoint_of(&current);
        assert!(accepted.same_endpoint(&current));
        assert_eq!(accepted.refresh_interval_ms, 200);
    }
}
