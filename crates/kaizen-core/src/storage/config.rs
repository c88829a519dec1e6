//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Fixed-cycle durations, long-break placement and auto-start
//! - Elastic ratio, carry-over and debt warning interval
//! - Notification preferences
//!
//! Configuration is stored at `~/.config/kaizen/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, CoreError};
use crate::timer::{
    AutoStart, ElasticSettings, TimerConfig, DEFAULT_RATIO, DEFAULT_TAG,
    DEFAULT_WARN_INTERVAL_MINUTES,
};

/// Fixed-cycle settings. Durations are in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardConfig {
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u64,
    #[serde(default = "default_break_minutes")]
    pub break_minutes: u64,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u64,
    #[serde(default = "default_long_break_interval")]
    pub long_break_interval: u32,
    #[serde(default)]
    pub long_break_enabled: bool,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default)]
    pub auto_start_focus: bool,
    #[serde(default)]
    pub auto_start_break: bool,
}

/// Elastic-ratio settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlexibleConfig {
    #[serde(default = "default_ratio")]
    pub ratio: f64,
    #[serde(default = "default_true")]
    pub carry_over: bool,
    #[serde(default = "default_warn_interval")]
    pub warn_interval_minutes: u64,
}

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/kaizen/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Tag applied to sessions started without `--tag`.
    #[serde(default = "default_tag")]
    pub default_tag: String,
    #[serde(default)]
    pub standard: StandardConfig,
    #[serde(default)]
    pub flexible: FlexibleConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

// Default functions
fn default_focus_minutes() -> u64 {
    25
}
fn default_break_minutes() -> u64 {
    5
}
fn default_long_break_minutes() -> u64 {
    15
}
fn default_long_break_interval() -> u32 {
    4
}
fn default_iterations() -> u32 {
    1
}
fn default_ratio() -> f64 {
    DEFAULT_RATIO
}
fn default_warn_interval() -> u64 {
    DEFAULT_WARN_INTERVAL_MINUTES
}
fn default_true() -> bool {
    true
}
fn default_tag() -> String {
    DEFAULT_TAG.into()
}

impl Default for StandardConfig {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            break_minutes: default_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            long_break_interval: default_long_break_interval(),
            long_break_enabled: false,
            iterations: default_iterations(),
            auto_start_focus: false,
            auto_start_break: false,
        }
    }
}

impl Default for FlexibleConfig {
    fn default() -> Self {
        Self {
            ratio: default_ratio(),
            carry_over: true,
            warn_interval_minutes: default_warn_interval(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_tag: default_tag(),
            standard: StandardConfig::default(),
            flexible: FlexibleConfig::default(),
            notifications: NotificationsConfig::default(),
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
        if key.is_empty() {
            return Err(unknown());
        }

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => value
                        .parse::<bool>()
                        .map(serde_json::Value::Bool)
                        .map_err(|e| invalid(e.to_string()))?,
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Location of the config file inside [`data_dir`].
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, CoreError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the defaults first if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, CoreError> {
        Self::load_from(&Self::path()?)
    }

    /// [`load`](Self::load) against an explicit file.
    ///
    /// # Errors
    /// Same as [`load`](Self::load). A file holding values the engines
    /// would refuse is also a load error.
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let load_failed = |message: String| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message,
        };
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| load_failed(e.to_string()))?;
                cfg.validate().map_err(|e| load_failed(e.to_string()))?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(load_failed(e.to_string()).into()),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), CoreError> {
        self.save_to(&Self::path()?)
    }

    /// [`save`](Self::save) against an explicit file.
    ///
    /// # Errors
    /// Same as [`save`](Self::save).
    pub fn save_to(&self, path: &Path) -> Result<(), CoreError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
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

    /// Update a value in memory by dot-separated key, keeping the existing
    /// value's type.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse
    /// as the key's type.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// [`set_value`](Self::set_value), then save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Every leaf key with its current value, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out.sort();
        out
    }

    /// Check the values the engines would refuse.
    ///
    /// # Errors
    /// Returns the first offending setting.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.timer_config().validate()?;
        crate::timer::validate_ratio(self.flexible.ratio)?;
        Ok(())
    }

    /// Fixed-cycle session settings, tagged with `default_tag`.
    pub fn timer_config(&self) -> TimerConfig {
        TimerConfig {
            long_break_interval: self.standard.long_break_interval,
            long_break_enabled: self.standard.long_break_enabled,
            target_iterations: self.standard.iterations,
            tag: self.default_tag.clone(),
            ..TimerConfig::from_minutes(
                self.standard.focus_minutes,
                self.standard.break_minutes,
                self.standard.long_break_minutes,
            )
        }
    }

    pub fn auto_start(&self) -> AutoStart {
        AutoStart {
            focus: self.standard.auto_start_focus,
            breaks: self.standard.auto_start_break,
        }
    }

    pub fn elastic_settings(&self) -> ElasticSettings {
        ElasticSettings {
            ratio: self.flexible.ratio,
            carry_over: self.flexible.carry_over,
            warn_interval_minutes: self.flexible.warn_interval_minutes,
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("{e}; using default settings");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: Config = toml::from_str("[standard]\nfocus_minutes = 50\n").unwrap();
        assert_eq!(parsed.standard.focus_minutes, 50);
        assert_eq!(parsed.standard.break_minutes, 5);
        assert_eq!(parsed.flexible.ratio, 3.0);
        assert!(parsed.notifications.enabled);
        assert_eq!(parsed.default_tag, "Standard");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("standard.focus_minutes").as_deref(), Some("25"));
        assert_eq!(cfg.get("flexible.carry_over").as_deref(), Some("true"));
        assert_eq!(cfg.get("default_tag").as_deref(), Some("Standard"));
        assert!(cfg.get("standard.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_value_preserves_types() {
        let mut cfg = Config::default();
        cfg.set_value("standard.long_break_enabled", "true").unwrap();
        cfg.set_value("standard.focus_minutes", "50").unwrap();
        cfg.set_value("flexible.ratio", "2.5").unwrap();
        cfg.set_value("default_tag", "Deep Work").unwrap();
        assert!(cfg.standard.long_break_enabled);
        assert_eq!(cfg.standard.focus_minutes, 50);
        assert_eq!(cfg.flexible.ratio, 2.5);
        assert_eq!(cfg.default_tag, "Deep Work");
    }

    #[test]
    fn integer_literal_is_accepted_for_float_field() {
        let mut cfg = Config::default();
        cfg.set_value("flexible.ratio", "4").unwrap();
        assert_eq!(cfg.flexible.ratio, 4.0);
    }

    #[test]
    fn set_value_rejects_unknown_key() {
        let mut cfg = Config::default();
        let err = cfg.set_value("standard.nonexistent", "1").unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::UnknownKey(_))));
        assert!(cfg.set_value("standard", "1").is_err());
    }

    #[test]
    fn set_value_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.set_value("standard.long_break_enabled", "maybe").is_err());
        assert!(cfg.set_value("standard.focus_minutes", "soon").is_err());
        assert!(cfg.set_value("standard.focus_minutes", "2.5").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn set_value_rejects_values_engines_refuse() {
        let mut cfg = Config::default();
        let err = cfg.set_value("standard.iterations", "0").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::BelowMinimum { .. })
        ));
        assert!(cfg.set_value("flexible.ratio", "0").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn entries_list_every_leaf() {
        let entries = Config::default().entries();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert!(keys.contains(&"standard.auto_start_break"));
        assert!(keys.contains(&"flexible.warn_interval_minutes"));
        assert!(keys.contains(&"notifications.enabled"));
        assert!(keys.contains(&"default_tag"));
        assert_eq!(entries.len(), 13);
    }

    #[test]
    fn engine_settings_are_derived_from_sections() {
        let mut cfg = Config::default();
        cfg.standard.focus_minutes = 50;
        cfg.standard.iterations = 3;
        cfg.standard.auto_start_break = true;
        cfg.default_tag = "Reading".into();

        let timer = cfg.timer_config();
        assert_eq!(timer.focus_duration, 3000);
        assert_eq!(timer.break_duration, 300);
        assert_eq!(timer.long_break_duration, 900);
        assert_eq!(timer.target_iterations, 3);
        assert_eq!(timer.tag, "Reading");
        assert_eq!(
            cfg.auto_start(),
            AutoStart {
                focus: false,
                breaks: true
            }
        );
        assert_eq!(cfg.elastic_settings(), ElasticSettings::default());
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn save_then_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.set_value("flexible.carry_over", "false").unwrap();
        cfg.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert!(!loaded.flexible.carry_over);
    }

    #[test]
    fn malformed_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "standard = [").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::LoadFailed { .. })));
    }

    #[test]
    fn hand_edited_invalid_values_are_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[flexible]\nratio = 0.0\n").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::LoadFailed { .. })));
        assert!(err.to_string().contains("Ratio"));

        std::fs::write(&path, "[standard]\niterations = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
