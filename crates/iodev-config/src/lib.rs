//! Configuration for embedders of `iodev-core`.
//!
//! A TOML file plus `IODEV_*` environment overrides, validated and
//! translated into `iodev_core::CoreConfig`. The core itself never reads
//! configuration from disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use iodev_core::{CoreConfig, SmartNameMode};

/// Upper bound for the recompute debounce.
const MAX_DEBOUNCE_MS: u64 = 60_000;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Language for localized object names.
    #[serde(default = "default_language")]
    pub language: String,

    /// Quiet period before a recompute, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Also list devices found outside the editable namespaces.
    #[serde(default = "default_true")]
    pub detect_foreign: bool,

    /// Ids sorted after everything else in the tree.
    #[serde(default)]
    pub trailing_ids: Vec<String>,

    #[serde(default)]
    pub namespaces: Namespaces,

    #[serde(default)]
    pub smart_names: SmartNames,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: default_language(),
            debounce_ms: default_debounce_ms(),
            detect_foreign: true,
            trailing_ids: Vec::new(),
            namespaces: Namespaces::default(),
            smart_names: SmartNames::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Namespaces {
    /// User-editable alias namespace.
    #[serde(default = "default_alias")]
    pub alias: String,

    /// Namespace of the linked-devices integration.
    #[serde(default = "default_linked")]
    pub linked: String,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            alias: default_alias(),
            linked: default_linked(),
        }
    }
}

/// Where smart names are written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SmartNames {
    /// `"common"` or `"custom"`.
    #[serde(default = "default_smart_name_mode")]
    pub mode: String,

    /// Integration instance owning the names in `custom` mode, e.g. `iot.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_id: Option<String>,
}

impl Default for SmartNames {
    fn default() -> Self {
        Self {
            mode: default_smart_name_mode(),
            integration_id: None,
        }
    }
}

fn default_language() -> String {
    "en".into()
}
fn default_debounce_ms() -> u64 {
    400
}
fn default_true() -> bool {
    true
}
fn default_alias() -> String {
    "alias.0".into()
}
fn default_linked() -> String {
    "linkeddevices.0".into()
}
fn default_smart_name_mode() -> String {
    "common".into()
}

// ── Validation and translation ──────────────────────────────────────

impl Config {
    /// Check every field without building a `CoreConfig`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_core_config().map(|_| ())
    }

    /// Translate into the core's runtime configuration.
    pub fn to_core_config(&self) -> Result<CoreConfig, ConfigError> {
        if self.language.trim().is_empty() {
            return Err(ConfigError::invalid("language", "must not be empty"));
        }
        if self.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::invalid(
                "debounce_ms",
                format!("must be at most {MAX_DEBOUNCE_MS}, got {}", self.debounce_ms),
            ));
        }
        check_instance_id("namespaces.alias", &self.namespaces.alias)?;
        check_instance_id("namespaces.linked", &self.namespaces.linked)?;
        if self.namespaces.alias == self.namespaces.linked {
            return Err(ConfigError::invalid(
                "namespaces.linked",
                "must differ from namespaces.alias",
            ));
        }

        Ok(CoreConfig {
            language: self.language.trim().to_owned(),
            debounce: Duration::from_millis(self.debounce_ms),
            alias_namespace: self.namespaces.alias.clone(),
            linked_namespace: self.namespaces.linked.clone(),
            smart_name_mode: self.smart_name_mode()?,
            detect_foreign: self.detect_foreign,
            trailing_ids: self.trailing_ids.clone(),
        })
    }

    fn smart_name_mode(&self) -> Result<SmartNameMode, ConfigError> {
        match self.smart_names.mode.as_str() {
            "common" => Ok(SmartNameMode::Common),
            "custom" => {
                let integration_id = self
                    .smart_names
                    .integration_id
                    .clone()
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| {
                        ConfigError::invalid(
                            "smart_names.integration_id",
                            "required when mode is 'custom'",
                        )
                    })?;
                check_instance_id("smart_names.integration_id", &integration_id)?;
                Ok(SmartNameMode::Custom { integration_id })
            }
            other => Err(ConfigError::invalid(
                "smart_names.mode",
                format!("expected 'common' or 'custom', got '{other}'"),
            )),
        }
    }
}

/// `<adapter>.<instance number>`, e.g. `alias.0`.
fn check_instance_id(field: &str, value: &str) -> Result<(), ConfigError> {
    let valid = value.split_once('.').is_some_and(|(adapter, instance)| {
        !adapter.is_empty()
            && !instance.is_empty()
            && instance.chars().all(|c| c.is_ascii_digit())
    });
    if valid {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("expected '<adapter>.<instance>', got '{value}'"),
        ))
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("net", "iobroker", "iodev").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("iodev");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load and validate the config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load and validate the config from `path` + environment.
///
/// A missing file yields the defaults. Environment variables use the
/// `IODEV_` prefix with `__` between nesting levels, e.g.
/// `IODEV_NAMESPACES__ALIAS=alias.1`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("IODEV_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Load config, returning the defaults if it is missing or invalid.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    cfg.validate()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_ids() {
        assert!(check_instance_id("f", "alias.0").is_ok());
        assert!(check_instance_id("f", "linkeddevices.12").is_ok());
        for bad in ["alias", "alias.", ".0", "alias.x", "alias.0.kitchen"] {
            assert!(check_instance_id("f", bad).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn defaults_translate_to_core_defaults() {
        assert_eq!(Config::default().to_core_config().ok(), Some(CoreConfig::default()));
    }
}
