//! TOML-based application configuration.
//!
//! Stores:
//! - Tick cadence and notification warning offsets
//! - Time-to-live of the one-shot restoration and pending-start intents
//! - Which snapshot backend to use
//! - The children and categories the CLI can address by id
//!
//! Configuration is stored at `~/.config/kidtimer/config.toml`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::data_dir;
use crate::error::ConfigError;
use crate::timer::{CategoryId, ChildId};

/// Timer engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Seconds before the end at which warning alerts fire.
    #[serde(default = "default_warning_offsets_secs")]
    pub warning_offsets_secs: Vec<u64>,
    #[serde(default = "default_restoration_notice_ttl_secs")]
    pub restoration_notice_ttl_secs: u64,
    #[serde(default = "default_pending_start_ttl_secs")]
    pub pending_start_ttl_secs: u64,
    /// Countdown length for categories without their own recommendation.
    #[serde(default = "default_duration_min")]
    pub default_duration_min: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Json,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Overrides the file inside the data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildEntry {
    pub id: ChildId,
    pub name: String,
    #[serde(default)]
    pub age: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_minutes: Option<u64>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/kidtimer/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub children: Vec<ChildEntry>,
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
}

fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_warning_offsets_secs() -> Vec<u64> {
    vec![300, 60]
}
fn default_restoration_notice_ttl_secs() -> u64 {
    60
}
fn default_pending_start_ttl_secs() -> u64 {
    30
}
fn default_duration_min() -> u64 {
    25
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            warning_offsets_secs: default_warning_offsets_secs(),
            restoration_notice_ttl_secs: default_restoration_notice_ttl_secs(),
            pending_start_ttl_secs: default_pending_start_ttl_secs(),
            default_duration_min: default_duration_min(),
        }
    }
}

impl TimerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn restoration_notice_ttl(&self) -> Duration {
        Duration::from_secs(self.restoration_notice_ttl_secs)
    }

    pub fn pending_start_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_start_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            storage: StorageConfig::default(),
            children: Vec::new(),
            categories: Vec::new(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk, writing the defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit it.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a value by key and save.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    pub fn child(&self, id: ChildId) -> Option<&ChildEntry> {
        self.children.iter().find(|c| c.id == id)
    }

    /// Resolve a child by id or case-insensitive name.
    pub fn find_child(&self, needle: &str) -> Option<&ChildEntry> {
        match Uuid::parse_str(needle) {
            Ok(id) => self.child(id),
            Err(_) => self
                .children
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(needle)),
        }
    }

    /// Minutes a countdown in this category runs when none are given.
    pub fn countdown_minutes(&self, category: &CategoryEntry) -> u64 {
        category
            .recommended_minutes
            .unwrap_or(self.timer.default_duration_min)
    }

    /// Resolve a category by id or case-insensitive name.
    pub fn find_category(&self, needle: &str) -> Option<&CategoryEntry> {
        match Uuid::parse_str(needle) {
            Ok(id) => self.categories.iter().find(|c| c.id == id),
            Err(_) => self
                .categories
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(needle)),
        }
    }
}
