// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./vehlog.toml` > `~/.config/vehlog/vehlog.toml` > `/etc/vehlog/vehlog.toml`
//! with environment variable overrides via `VEHLOG_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::VehlogConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/vehlog/vehlog.toml` (system-wide)
/// 3. `~/.config/vehlog/vehlog.toml` (user XDG config)
/// 4. `./vehlog.toml` (local directory)
/// 5. `VEHLOG_*` environment variables
pub fn load_config() -> Result<VehlogConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<VehlogConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VehlogConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<VehlogConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VehlogConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(VehlogConfig::default()))
        .merge(Toml::file("/etc/vehlog/vehlog.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("vehlog/vehlog.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("vehlog.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `VEHLOG_SUMMARIZER_RUN_EVERY_SECS` must map to
/// `summarizer.run_every_secs`. Auth secrets are case-sensitive by name and
/// env keys are lowercased, so `auth` is only read from files.
fn env_provider() -> Env {
    Env::prefixed("VEHLOG_")
        .filter(|key| !key.as_str().to_ascii_lowercase().starts_with("auth"))
        .map(|key| {
            let key_str = key.as_str().to_ascii_lowercase();
            let mapped = key_str
                .replacen("server_", "server.", 1)
                .replacen("storage_", "storage.", 1)
                .replacen("summarizer_", "summarizer.", 1);
            mapped.into()
        })
}
