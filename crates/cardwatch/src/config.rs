//! CLI-side configuration: thin wrappers over `cardwatch-config` that
//! apply `GlobalOpts` overrides on top of the chosen profile.

pub use cardwatch_config::{Config, Profile, config_path, load_config_or_default, save_config};

use cardwatch_config::profile_to_dashboard_config;
use cardwatch_core::DashboardConfig;

use clap::ValueEnum;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

// ── Profile resolution ───────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Pick the output format: `-o` / `CARDWATCH_OUTPUT`, else `defaults.output`.
pub fn resolve_output(flag: Option<OutputFormat>, config: &Config) -> Result<OutputFormat, CliError> {
    if let Some(format) = flag {
        return Ok(format);
    }
    OutputFormat::from_str(&config.defaults.output, true).map_err(|_| CliError::Validation {
        field: "defaults.output".into(),
        reason: format!(
            "unknown output format '{}'. Valid: table, json, json-compact, yaml, plain",
            config.defaults.output
        ),
    })
}

/// Translate the active profile plus global flags into a `DashboardConfig`.
///
/// Precedence is flag > env > profile > defaults. Without any profile the
/// built-in API root is used, so a bare install talks to a local backend.
pub fn resolve_dashboard_config(global: &GlobalOpts) -> Result<DashboardConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            names.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if names.is_empty() {
                    "(none)".into()
                } else {
                    names.join(", ")
                },
            });
        }
        None => Profile::default(),
    };

    if let Some(ref url) = global.api_url {
        profile.api_url.clone_from(url);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    tracing::debug!(profile = %profile_name, api_url = %profile.api_url, "resolved profile");
    Ok(profile_to_dashboard_config(&profile, &cfg.defaults)?)
}
