//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Check-in behavior (enabled flag, quiet window, per-session cap)
//! - Snapshot autosave cadence
//! - Journal defaults (reflection time, text input visibility)
//! - Foreground run-loop behavior
//!
//! Configuration is stored at `~/.config/settle/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::checkin::CheckInConfig;

/// Check-in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum seconds of quiet before a check-in may appear.
    #[serde(default = "default_min_secs_before")]
    pub min_secs_before: u32,
    #[serde(default = "default_max_auto_per_session")]
    pub max_auto_per_session: u32,
}

/// Snapshot persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceSection {
    /// How often the foreground run loop re-saves the active session.
    #[serde(default = "default_autosave_interval_secs")]
    pub autosave_interval_secs: u32,
}

/// Journal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalSection {
    /// Advisory seconds per prompt.
    #[serde(default = "default_reflection_secs")]
    pub reflection_secs: u32,
    #[serde(default = "default_true")]
    pub show_text_input: bool,
}

/// Foreground run-loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_true")]
    pub auto_advance: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/settle/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub check_in: CheckInSection,
    #[serde(default)]
    pub persistence: PersistenceSection,
    #[serde(default)]
    pub journal: JournalSection,
    #[serde(default)]
    pub run: RunSection,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_min_secs_before() -> u32 {
    180
}
fn default_max_auto_per_session() -> u32 {
    1
}
fn default_autosave_interval_secs() -> u32 {
    30
}
fn default_reflection_secs() -> u32 {
    60
}
fn default_tick_interval_ms() -> u64 {
    250
}

impl Default for CheckInSection {
    fn default() -> Self {
        Self {
            enabled: true,
            min_secs_before: default_min_secs_before(),
            max_auto_per_session: default_max_auto_per_session(),
        }
    }
}

impl Default for PersistenceSection {
    fn default() -> Self {
        Self {
            autosave_interval_secs: default_autosave_interval_secs(),
        }
    }
}

impl Default for JournalSection {
    fn default() -> Self {
        Self {
            reflection_secs: default_reflection_secs(),
            show_text_input: true,
        }
    }
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            auto_advance: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_in: CheckInSection::default(),
            persistence: PersistenceSection::default(),
            journal: JournalSection::default(),
            run: RunSection::default(),
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
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err("config key is empty".into());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| format!("unknown config key: {key}"))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| format!("unknown config key: {key}"))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(value.parse::<bool>()?),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| format!("cannot parse '{value}' as number"))?
                        } else {
                            return Err(format!("cannot parse '{value}' as number").into());
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value)?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| format!("unknown config key: {key}"))?;
        }

        Err(format!("unknown config key: {key}").into())
    }

    fn path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content)?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(Self::path()?, content)?;
        Ok(())
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

    /// Set a config value by key. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json)?;
        self.save()?;
        Ok(())
    }

    /// Check-in controller settings derived from the `[check_in]` section.
    pub fn check_in_config(&self) -> CheckInConfig {
        CheckInConfig {
            enabled: self.check_in.enabled,
            min_secs_before: self.check_in.min_secs_before,
            max_auto_per_session: self.check_in.max_auto_per_session,
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
