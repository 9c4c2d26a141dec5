//! Source definition loading.
//!
//! Definitions come from the TOML files embedded in the binary (see
//! [`crate::registry::all_definitions`]) or from a user file passed on the
//! command line, which replaces them entirely. The enabled set can then be
//! narrowed with `--sources` or the [`SOURCES_ENV_VAR`] environment
//! variable.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use response_planner_source_models::SourceDefinition;
use serde::Deserialize;

use crate::registry::all_definitions;

/// Environment variable holding a comma-separated list of source ids to
/// enable.
pub const SOURCES_ENV_VAR: &str = "RESPONSE_PLANNER_SOURCES";

/// Errors that can occur while loading source definitions.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The TOML was malformed or missing required fields.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Two definitions share an id.
    #[error("Duplicate source id: {id}")]
    DuplicateId {
        /// The repeated id.
        id: String,
    },
}

/// A user config file: a list of `[[sources]]` tables.
#[derive(Debug, Deserialize)]
pub struct SourcesFile {
    /// The source definitions.
    #[serde(default)]
    pub sources: Vec<SourceDefinition>,
}

/// Parses a single [`SourceDefinition`] from a TOML string.
///
/// # Errors
///
/// Returns [`ConfigError::Toml`] if the TOML is malformed or missing
/// required fields.
pub fn parse_source_toml(toml_str: &str) -> Result<SourceDefinition, ConfigError> {
    Ok(toml::de::from_str(toml_str)?)
}

/// Parses a `[[sources]]` file body.
///
/// # Errors
///
/// Returns [`ConfigError`] if the TOML is malformed or two sources share an
/// id.
pub fn parse_sources_file(toml_str: &str) -> Result<Vec<SourceDefinition>, ConfigError> {
    let file: SourcesFile = toml::de::from_str(toml_str)?;
    ensure_unique_ids(&file.sources)?;
    Ok(file.sources)
}

/// Reads and parses a `[[sources]]` file.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or parsed.
pub fn load_sources_file(path: &Path) -> Result<Vec<SourceDefinition>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_sources_file(&contents)
}

/// Resolves the definitions to register.
///
/// Uses `config_path` when given, the embedded definitions otherwise. If a
/// filter is given (or set through [`SOURCES_ENV_VAR`]) exactly the listed
/// sources are enabled, including ones disabled by default; the rest stay
/// registered but disabled.
///
/// # Errors
///
/// Returns [`ConfigError`] if the config file cannot be loaded.
pub fn resolve_definitions(
    config_path: Option<&Path>,
    cli_filter: Option<String>,
) -> Result<Vec<SourceDefinition>, ConfigError> {
    let definitions = match config_path {
        Some(path) => load_sources_file(path)?,
        None => all_definitions(),
    };

    let filter = cli_filter.or_else(|| std::env::var(SOURCES_ENV_VAR).ok());
    Ok(apply_filter(definitions, filter.as_deref()))
}

/// Enables exactly the ids listed in `filter`, if one is given.
#[must_use]
pub fn apply_filter(
    mut definitions: Vec<SourceDefinition>,
    filter: Option<&str>,
) -> Vec<SourceDefinition> {
    let Some(filter_str) = filter.map(str::trim).filter(|s| !s.is_empty()) else {
        return definitions;
    };

    let ids: BTreeSet<&str> = filter_str
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    for def in &mut definitions {
        def.enabled = ids.contains(def.id());
    }

    if !definitions.iter().any(|d| d.enabled) {
        log::warn!(
            "No matching sources found for filter {:?}. Available: {}",
            ids,
            definitions
                .iter()
                .map(SourceDefinition::id)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    definitions
}

fn ensure_unique_ids(definitions: &[SourceDefinition]) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for def in definitions {
        if !seen.insert(def.id()) {
            return Err(ConfigError::DuplicateId { id: def.id.clone() });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SOURCES: &str = r#"
        [[sources]]
        id = "a"
        name = "A"
        [sources.fetcher]
        type = "dataset"
        dataset = "a"

        [[sources]]
        id = "b"
        name = "B"
        enabled = false
        [sources.fetcher]
        type = "feature_service"
        service_name = "B"
        service_index = 1
        base_url = "http://localhost:9000/services"
        [sources.fields]
        label = "FACILITY"
    "#;

    #[test]
    fn parses_sources_file() {
        let defs = parse_sources_file(TWO_SOURCES).unwrap();
        assert_eq!(defs.len(), 2);
        assert!(defs[0].enabled);
        assert!(!defs[1].enabled);
        assert_eq!(defs[1].fields.label(), "FACILITY");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let doubled = format!("{TWO_SOURCES}\n{}", TWO_SOURCES.replace("\"b\"", "\"c\""));
        let err = parse_sources_file(&doubled).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateId { ref id } if id == "a"));
    }

    #[test]
    fn filter_enables_exactly_listed_ids() {
        let defs = parse_sources_file(TWO_SOURCES).unwrap();
        let filtered = apply_filter(defs, Some(" b , missing "));
        assert_eq!(filtered.len(), 2);
        assert!(!filtered[0].enabled);
        assert!(filtered[1].enabled);
    }

    #[test]
    fn empty_filter_keeps_configured_flags() {
        let defs = parse_sources_file(TWO_SOURCES).unwrap();
        let kept = apply_filter(defs, Some("  "));
        assert!(kept[0].enabled);
        assert!(!kept[1].enabled);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_sources_file(Path::new("/nonexistent/response_planner.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
