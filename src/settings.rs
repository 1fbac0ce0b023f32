//! # Persisted Settings
//!
//! Key/value persistence for the few settings the serial link remembers
//! between runs: port name, baud rate and whether the last open succeeded.
//!
//! The store is injected into the link rather than reached for globally.
//! Keys are namespaced by channel id (`<channel>.<key>`) so several links
//! can share one store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{GpsOutError, Result};

/// Key/value persistence interface
#[cfg_attr(test, mockall::automock)]
pub trait SettingsStore: Send {
    /// Stored value for `key`, if any
    fn load(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`
    fn save(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Load and parse a value, ignoring entries that do not parse
pub fn load_parsed<T: FromStr>(store: &dyn SettingsStore, key: &str) -> Option<T> {
    store.load(key).and_then(|value| value.trim().parse().ok())
}

/// Setting keys for one serial channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingKeys {
    prefix: String,
}

impl SettingKeys {
    /// Keys for `channel`; an empty channel id means no namespace
    pub fn new(channel: &str) -> Self {
        let prefix = if channel.is_empty() {
            String::new()
        } else {
            format!("{}.", channel)
        };
        Self { prefix }
    }

    pub fn port_name(&self) -> String {
        format!("{}port_name", self.prefix)
    }

    pub fn baud_rate(&self) -> String {
        format!("{}baud_rate", self.prefix)
    }

    pub fn serial_successful(&self) -> String {
        format!("{}serial_successful", self.prefix)
    }
}

/// Settings kept in a flat TOML table of strings
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileSettingsStore {
    /// Open the store at `path`; a missing file starts empty
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            toml::from_str(&contents)?
        } else {
            debug!("No settings file at {}, starting empty", path.display());
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let contents = toml::to_string(&self.values)
            .map_err(|e| GpsOutError::Settings(format!("Failed to serialize settings: {}", e)))?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        if self.values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }
}

/// In-memory store; clones share the same table
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    values: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored entry
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
