// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics rendered with miette.
//!
//! Figment errors are mapped onto the vehlog config layout: each bad key is
//! traced back to the `vehlog.toml` line or the `VEHLOG_*` variable that set
//! it, typos get a Jaro-Winkler suggestion, and the help text describes the
//! section the key belongs to.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "VEHLOG_";

/// A configuration error with enough context for a miette report.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A config file names a key the section does not have.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(code(vehlog::config::unknown_key), help("{help}"))]
    UnknownKey {
        /// Dotted path of the unrecognized key.
        key: String,
        /// Closest valid key, if any is close enough.
        suggestion: Option<String>,
        help: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A `VEHLOG_*` variable maps to a key the section does not have.
    #[error("unknown environment variable `{var}`")]
    #[diagnostic(code(vehlog::config::unknown_env), help("{help}"))]
    UnknownEnvVar {
        var: String,
        /// Closest valid variable name, if any is close enough.
        suggestion: Option<String>,
        help: String,
    },

    /// A configuration value has the wrong type.
    #[error("invalid type for `{key}`: {detail}")]
    #[diagnostic(code(vehlog::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Dotted key path, or the variable name when set from the environment.
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value parsed but failed a semantic check.
    #[error("validation error: {message}")]
    #[diagnostic(code(vehlog::config::validation))]
    Validation { message: String },

    /// Catch-all for other configuration errors.
    #[error("configuration error: {0}")]
    #[diagnostic(code(vehlog::config::other))]
    Other(String),
}

/// What a section is for, shown under unknown-key errors.
fn section_help(section: Option<&str>) -> &'static str {
    match section {
        None => "vehlog.toml has the sections [server], [storage], [auth] and [summarizer]",
        Some("server") => "[server] sets the HTTP listener, body size limit and log level",
        Some("storage") => "[storage] locates the SQLite event database",
        Some("auth") => {
            "[auth] only holds `keys`, a table of authtoken name = shared secret; \
             it is read from config files, never from VEHLOG_ variables"
        }
        Some("summarizer") => {
            "[summarizer] intervals are whole seconds except `pause_ms`; \
             `trigger` is \"timer\" or \"after_ingest\""
        }
        Some(_) => "see the [server], [storage], [auth] and [summarizer] sections",
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &[&str], section: Option<&str>) -> String {
    let valid = valid_keys.join(", ");
    let about = section_help(section);
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid}. {about}"),
        None => format!("valid keys: {valid}. {about}"),
    }
}

/// The `VEHLOG_*` variable that the loader maps onto `section.key`.
pub fn env_var_name(section: Option<&str>, key: &str) -> String {
    match section {
        Some(section) => format!("{ENV_PREFIX}{section}_{key}"),
        None => format!("{ENV_PREFIX}{key}"),
    }
    .to_ascii_uppercase()
}

/// The variable name, when the key is in no config file but its variable is set.
fn set_by_env(section: Option<&str>, key: &str, found_in_file: bool) -> Option<String> {
    if found_in_file {
        return None;
    }
    let var = env_var_name(section, key);
    std::env::var_os(&var).map(|_| var)
}

/// Convert a `figment::Error` into a list of `ConfigError` diagnostics.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    let mut errors = Vec::new();

    for error in err {
        let path: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();

        let config_error = match &error.kind {
            Kind::UnknownField(field, expected) => {
                let section = path.first().map(String::as_str);
                let valid_keys: Vec<&str> = expected.to_vec();
                let (span, src) = find_source_span(&path, field, toml_sources);

                match set_by_env(section, field, span.is_some()) {
                    Some(var) => {
                        let valid_vars: Vec<String> = valid_keys
                            .iter()
                            .map(|k| env_var_name(section, k))
                            .collect();
                        let valid_refs: Vec<&str> = valid_vars.iter().map(String::as_str).collect();
                        let suggestion = suggest_key(&var, &valid_refs);
                        ConfigError::UnknownEnvVar {
                            help: unknown_key_help(suggestion.as_deref(), &valid_refs, section),
                            var,
                            suggestion,
                        }
                    }
                    None => {
                        let suggestion = suggest_key(field, &valid_keys);
                        let key = match section {
                            Some(section) => format!("{section}.{field}"),
                            None => field.clone(),
                        };
                        ConfigError::UnknownKey {
                            help: unknown_key_help(suggestion.as_deref(), &valid_keys, section),
                            key,
                            suggestion,
                            span,
                            src,
                        }
                    }
                }
            }
            Kind::InvalidType(actual, expected) => {
                let (section_path, field) = match path.split_last() {
                    Some((field, section_path)) => (section_path, field.as_str()),
                    None => (&path[..], ""),
                };
                let (span, src) = find_source_span(section_path, field, toml_sources);
                let section = section_path.first().map(String::as_str);
                let key = set_by_env(section, field, span.is_some())
                    .unwrap_or_else(|| path.join("."));
                ConfigError::InvalidType {
                    key,
                    detail: format!("found {actual}"),
                    expected: expected.to_string(),
                    span,
                    src,
                }
            }
            _ => ConfigError::Other(format!("{error}")),
        };

        errors.push(config_error);
    }

    errors
}

/// Locate `field` under the section in whichever loaded TOML file has it.
fn find_source_span(
    section_path: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    if field.is_empty() {
        return (None, None);
    }
    for (path, content) in toml_sources {
        if let Some(offset) = find_key_offset(content, section_path, field) {
            let span = SourceSpan::new(offset.into(), field.len());
            return (Some(span), Some(NamedSource::new(path, content.clone())));
        }
    }
    (None, None)
}

/// Find the byte offset of a key in TOML content, relative to a section path.
///
/// For `path = ["summarizer"]` and `field = "run_evry_secs"`, finds the
/// `[summarizer]` header then searches for the key after it, stopping at the
/// next section header. Top-level fields are searched from the start.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let search_start = match path.first() {
        None => 0,
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header).map(|pos| pos + header.len())?
        }
    };

    let mut byte_offset = search_start;
    for line in content[search_start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if !path.is_empty() && trimmed.starts_with('[') && byte_offset > search_start {
            return None;
        }
        if let Some(after) = trimmed.strip_prefix(field)
            && after.starts_with([' ', '\t', '='])
        {
            return Some(byte_offset + (line.len() - trimmed.len()));
        }
        byte_offset += line.len();
    }

    None
}

/// Suggest a similar key name using Jaro-Winkler string similarity.
///
/// Returns the best match above the similarity threshold, or `None` if
/// no valid key is close enough to the unknown key.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    let mut best_score = SUGGESTION_THRESHOLD;
    let mut best_match = None;

    for &key in valid_keys {
        let score = strsim::jaro_winkler(unknown, key);
        if score > best_score {
            best_score = score;
            best_match = Some(key.to_string());
        }
    }

    best_match
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}
