//! Shared configuration for the cardwatch CLI.
//!
//! TOML profiles, environment overrides and translation to
//! `cardwatch_core::DashboardConfig`. Core never reads files; it receives
//! a pre-built `DashboardConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cardwatch_core::{DEFAULT_API_URL, DashboardConfig};

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

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    /// REST request timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Present-roster self-refresh period, seconds. 0 disables it.
    #[serde(default = "default_present_refresh")]
    pub present_refresh: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
            present_refresh: default_present_refresh(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_present_refresh() -> u64 {
    30
}

/// A named backend profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// REST API root (e.g., "http://localhost:3000/api").
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Event stream path relative to `api_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_path: Option<String>,

    /// Override insecure TLS setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    /// Override timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Override present-roster refresh period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub present_refresh: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            stream_path: None,
            insecure: None,
            timeout: None,
            present_refresh: None,
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "cardwatch", "cardwatch").map_or_else(
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
    p.push("cardwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path`, layering defaults → TOML → `CARDWATCH_*` env.
///
/// Nested keys use a double underscore: `CARDWATCH_DEFAULTS__TIMEOUT=60`.
/// A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CARDWATCH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file is missing or broken.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation to core ─────────────────────────────────────────────

/// Build a `DashboardConfig` from a profile, filling gaps from `defaults`.
pub fn profile_to_dashboard_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<DashboardConfig, ConfigError> {
    let url = parse_api_url(&profile.api_url)?;

    let mut config = DashboardConfig::new(url);
    if let Some(ref stream_path) = profile.stream_path {
        config.stream_path.clone_from(stream_path);
    }
    config.accept_invalid_certs = profile.insecure.unwrap_or(defaults.insecure);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.present_refresh_interval =
        Duration::from_secs(profile.present_refresh.unwrap_or(defaults.present_refresh));
    Ok(config)
}

/// Parse and validate an API root URL.
pub fn parse_api_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "api_url".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("expected http or https, got '{}'", url.scheme()),
        });
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn profile_inherits_defaults() {
        let defaults = Defaults {
            timeout: 12,
            insecure: true,
            ..Defaults::default()
        };
        let cfg = profile_to_dashboard_config(&Profile::default(), &defaults).unwrap();

        assert_eq!(cfg.api_url.as_str(), "http://localhost:3000/api");
        assert_eq!(cfg.timeout, Duration::from_secs(12));
        assert!(cfg.accept_invalid_certs);
        assert_eq!(cfg.stream_path, "stream");
        assert_eq!(cfg.present_refresh_interval, Duration::from_secs(30));
    }

    #[test]
    fn profile_overrides_win() {
        let profile = Profile {
            api_url: "https://door.example/api".into(),
            stream_path: Some("events".into()),
            insecure: Some(false),
            timeout: Some(5),
            present_refresh: Some(0),
        };
        let defaults = Defaults {
            insecure: true,
            ..Defaults::default()
        };
        let cfg = profile_to_dashboard_config(&profile, &defaults).unwrap();

        assert_eq!(cfg.stream_url().unwrap().as_str(), "https://door.example/api/events");
        assert!(!cfg.accept_invalid_certs);
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        assert!(cfg.present_refresh_interval.is_zero());
    }

    #[test]
    fn rejects_non_http_urls() {
        let err = parse_api_url("ftp://example.com").unwrap_err();
        assert!(err.to_string().contains("expected http or https"));
        assert!(parse_api_url("not a url").is_err());
    }
}
