// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the vehlog trip logger.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level vehlog configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VehlogConfig {
    /// HTTP listener and logging settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Shared secrets for sender authentication.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Trip summarization scheduling.
    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

/// HTTP listener and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Address to bind the HTTP listener to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port for the HTTP listener.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted event body, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            bind_address: default_bind_address(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    5000
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("vehlog").join("vehlog.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("vehlog.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Sender authentication configuration.
///
/// `Debug` prints key names only.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Authtoken name -> shared secret.
    #[serde(default)]
    pub keys: BTreeMap<String, String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("keys", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// When summarization cycles are started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarizeTrigger {
    /// On an independent timer, every `run_every_secs`.
    #[default]
    Timer,
    /// Opportunistically after each successful ingest.
    AfterIngest,
}

/// Trip summarization configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SummarizerConfig {
    /// Minimum seconds between two summarization cycles.
    #[serde(default = "default_run_every_secs")]
    pub run_every_secs: u64,

    /// A trip must have been idle this many seconds before it is summarized.
    #[serde(default = "default_min_quiescence_secs")]
    pub min_quiescence_secs: u64,

    /// Pause between trips inside one cycle, in milliseconds.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,

    /// How long a worker's claim on a trip lasts, in seconds.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,

    /// What starts a summarization cycle.
    #[serde(default)]
    pub trigger: SummarizeTrigger,

    /// Number of trailing event types kept in each summary.
    #[serde(default = "default_last_eventtypes_len")]
    pub last_eventtypes_len: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            run_every_secs: default_run_every_secs(),
            min_quiescence_secs: default_min_quiescence_secs(),
            pause_ms: default_pause_ms(),
            lease_secs: default_lease_secs(),
            trigger: SummarizeTrigger::default(),
            last_eventtypes_len: default_last_eventtypes_len(),
        }
    }
}

fn default_run_every_secs() -> u64 {
    30
}

fn default_min_quiescence_secs() -> u64 {
    120
}

fn default_pause_ms() -> u64 {
    500
}

fn default_lease_secs() -> u64 {
    300
}

fn default_last_eventtypes_len() -> usize {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = VehlogConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_body_bytes, 5000);
        assert_eq!(config.summarizer.run_every_secs, 30);
        assert_eq!(config.summarizer.min_quiescence_secs, 120);
        assert_eq!(config.summarizer.trigger, SummarizeTrigger::Timer);
        assert!(config.auth.keys.is_empty());
        assert!(config.storage.database_path.ends_with("vehlog.db"));
    }

    #[test]
    fn auth_debug_hides_secrets() {
        let mut auth = AuthConfig::default();
        auth.keys.insert("MAR2018".into(), "hunter2".into());
        let rendered = format!("{auth:?}");
        assert!(rendered.contains("MAR2018"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn trigger_uses_snake_case() {
        let config: SummarizerConfig = toml::from_str("trigger = \"after_ingest\"").unwrap();
        assert_eq!(config.trigger, SummarizeTrigger::AfterIngest);
    }
}
