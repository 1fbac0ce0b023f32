//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{GpsOutError, Result};

/// Highest baud rate the link accepts
pub const MAX_BAUD_RATE: u32 = 115_200;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub agio: AgioConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    #[serde(default)]
    pub dtr: bool,

    #[serde(default)]
    pub rts: bool,

    /// Pending input above this many bytes is discarded
    #[serde(default = "default_discard_threshold")]
    pub discard_threshold: usize,

    /// Open at start-up unless the previous session failed to connect
    #[serde(default = "default_auto_connect")]
    pub auto_connect: bool,

    /// Open at start-up even if the previous session failed to connect
    #[serde(default)]
    pub open_on_start: bool,

    /// Namespace for persisted settings keys
    #[serde(default)]
    pub channel: String,
}

/// Outbound sentence configuration
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_sentence_interval_ms")]
    pub sentence_interval_ms: u64,
}

/// UDP binary frame source configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AgioConfig {
    #[serde(default = "default_agio_enabled")]
    pub enabled: bool,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

/// Persisted settings store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    #[serde(default = "default_settings_path")]
    pub path: String,
}

/// Diagnostic log file configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 38400 }
fn default_read_timeout_ms() -> u64 { 1500 }
fn default_write_timeout_ms() -> u64 { 500 }
fn default_discard_threshold() -> usize { 150 }
fn default_auto_connect() -> bool { true }

fn default_sentence_interval_ms() -> u64 { 200 }

fn default_agio_enabled() -> bool { true }
fn default_listen_addr() -> String { "0.0.0.0:17777".to_string() }

fn default_settings_path() -> String { "gps_out_settings.toml".to_string() }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_file_prefix() -> String { "gps-out.log".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            dtr: false,
            rts: false,
            discard_threshold: default_discard_threshold(),
            auto_connect: default_auto_connect(),
            open_on_start: false,
            channel: String::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { sentence_interval_ms: default_sentence_interval_ms() }
    }
}

impl Default for AgioConfig {
    fn default() -> Self {
        Self {
            enabled: default_agio_enabled(),
            listen_addr: default_listen_addr(),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self { path: default_settings_path() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            file_prefix: default_file_prefix(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> GpsOutError {
    GpsOutError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gps_out::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if self.serial.baud_rate == 0 || self.serial.baud_rate > MAX_BAUD_RATE {
            return Err(invalid(format!("baud_rate must be between 1 and {}", MAX_BAUD_RATE)));
        }

        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > 10000 {
            return Err(invalid("read_timeout_ms must be between 1 and 10000"));
        }

        if self.serial.write_timeout_ms == 0 || self.serial.write_timeout_ms > 10000 {
            return Err(invalid("write_timeout_ms must be between 1 and 10000"));
        }

        if self.serial.discard_threshold == 0 {
            return Err(invalid("discard_threshold must be greater than 0"));
        }

        if self.output.sentence_interval_ms == 0 || self.output.sentence_interval_ms > 60000 {
            return Err(invalid("sentence_interval_ms must be between 1 and 60000"));
        }

        if self.agio.enabled && self.agio.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(invalid(format!(
                "agio listen_addr '{}' is not a socket address",
                self.agio.listen_addr
            )));
        }

        if self.settings.path.is_empty() {
            return Err(invalid("settings path cannot be empty"));
        }

        if self.logging.dir.is_empty() {
            return Err(invalid("logging dir cannot be empty"));
        }

        if self.logging.file_prefix.is_empty() {
            return Err(invalid("logging file_prefix cannot be empty"));
        }

        Ok(())
    }
}
