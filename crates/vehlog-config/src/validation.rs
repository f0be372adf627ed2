// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid bind addresses, non-empty paths, and positive intervals.

use crate::diagnostic::ConfigError;
use crate::model::VehlogConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &VehlogConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let addr = config.server.bind_address.trim();
    if addr.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.bind_address must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = addr.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = addr
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!(
                    "server.bind_address `{addr}` is not a valid IP address or hostname"
                ),
            });
        }
    }

    if config.server.max_body_bytes == 0 {
        errors.push(ConfigError::Validation {
            message: "server.max_body_bytes must be greater than 0".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    for (name, secret) in &config.auth.keys {
        if name.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "auth.keys must not contain an empty token name".to_string(),
            });
        }
        if secret.is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("auth.keys.{name} must not be an empty secret"),
            });
        }
    }

    let summarizer = &config.summarizer;
    if summarizer.run_every_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "summarizer.run_every_secs must be at least 1".to_string(),
        });
    }
    if summarizer.lease_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "summarizer.lease_secs must be at least 1".to_string(),
        });
    }
    if summarizer.last_eventtypes_len == 0 {
        errors.push(ConfigError::Validation {
            message: "summarizer.last_eventtypes_len must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
