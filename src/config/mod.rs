//! # Configuration Management Module
//!
//! Loads and writes the TOML configuration used by the `boardlink` binary and converts it
//! into the runtime settings types of the [`link`](crate::link) and
//! [`protocol`](crate::protocol) modules.
//!
//! ## Configuration Structure
//!
//! - [`DeviceConfig`] - fallback device, baud rate, reconnect interval and discovery
//! - [`PollerConfig`] - serial poller timing
//! - [`LoggingConfig`] - log level and optional log file
//!
//! Every section and field has a default, so a partial (or empty) file is valid.
//!
//! ## Configuration File Format
//!
//! ```toml
//! [device]
//! default_port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! reconnect_interval_ms = 2000
//!
//! [device.discovery]
//! prefixes = ["/dev/ttyUSB", "/dev/ttyACM"]
//! max_index = 10
//! directories = ["/dev/serial/by-id", "/dev/serial/by-path"]
//!
//! [poller]
//! poll_interval_ms = 10
//! error_backoff_ms = 100
//! chunk_size = 256
//!
//! [logging]
//! level = "info"
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use boardlink::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Fallback port: {}", config.device.default_port);
//!     Config::create_default("config.example.toml").await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::discovery::PortDiscovery;
use crate::link::{PollerSettings, DEFAULT_BAUD_RATE};
use crate::protocol::{ControllerSettings, DEFAULT_PORT};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device opened when discovery finds nothing.
    #[serde(default = "default_port")]
    pub default_port: String,
    /// Unsupported values are replaced by 115200 when the port is opened.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    #[serde(default)]
    pub discovery: PortDiscovery,
}

fn default_port() -> String {
    DEFAULT_PORT.to_string()
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_reconnect_interval_ms() -> u64 {
    2000
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            default_port: default_port(),
            baud_rate: default_baud_rate(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            discovery: PortDiscovery::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_error_backoff_ms() -> u64 {
    100
}

fn default_chunk_size() -> usize {
    256
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of `error`, `warn`, `info`, `debug`, `trace`.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Parsed level; unknown strings fall back to `Info`.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        if config.poller.chunk_size == 0 {
            return Err(anyhow!("poller.chunk_size must be greater than zero"));
        }
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            default_port: self.device.default_port.clone(),
            baud_rate: self.device.baud_rate,
            reconnect_interval: Duration::from_millis(self.device.reconnect_interval_ms),
        }
    }

    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            poll_interval: Duration::from_millis(self.poller.poll_interval_ms),
            error_backoff: Duration::from_millis(self.poller.error_backoff_ms),
            chunk_size: self.poller.chunk_size,
        }
    }

    pub fn discovery(&self) -> PortDiscovery {
        self.device.discovery.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.device.default_port, "/dev/ttyUSB0");
        assert_eq!(config.device.baud_rate, 115200);
        assert_eq!(config.device.discovery, PortDiscovery::default());
        assert_eq!(config.poller.chunk_size, 256);
        assert_eq!(config.logging.level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [device]
            default_port = "/dev/ttyACM0"

            [device.discovery]
            max_index = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.device.default_port, "/dev/ttyACM0");
        assert_eq!(config.device.reconnect_interval_ms, 2000);
        assert_eq!(config.device.discovery.max_index, 4);
        assert_eq!(config.device.discovery.prefixes.len(), 2);
    }

    #[test]
    fn settings_conversion() {
        let mut config = Config::default();
        config.device.reconnect_interval_ms = 750;
        config.poller.error_backoff_ms = 40;
        let controller = config.controller_settings();
        assert_eq!(controller.reconnect_interval, Duration::from_millis(750));
        assert_eq!(controller.baud_rate, 115200);
        let poller = config.poller_settings();
        assert_eq!(poller.error_backoff, Duration::from_millis(40));
        assert_eq!(poller.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        let logging = LoggingConfig {
            level: "chatty".to_string(),
            file: None,
        };
        assert_eq!(logging.level_filter(), log::LevelFilter::Info);
        let logging = LoggingConfig {
            level: "debug".to_string(),
            file: None,
        };
        assert_eq!(logging.level_filter(), log::LevelFilter::Debug);
    }
}
