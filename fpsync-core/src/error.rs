//! Error types for fpsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading the SIS roster.
///
/// Every variant is fatal to a run: the roster is rejected before any
/// remote traffic happens.
#[derive(Debug, Error)]
pub enum RosterError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("failed to read roster at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not a JSON array of objects.
    #[error("failed to parse roster at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The document is not a YAML sequence of mappings.
    #[error("failed to parse roster at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required field is absent or blank.
    #[error("roster row {row}: missing required field '{field}'")]
    MissingField { row: usize, field: &'static str },

    /// A field is present but cannot be used.
    #[error("roster row {row}: invalid '{field}': {reason}")]
    InvalidField {
        row: usize,
        field: &'static str,
        reason: String,
    },

    /// Two rows share the same canonical student identifier.
    #[error("roster rows {first} and {second} share studentIdentifier '{external_id}'")]
    DuplicateExternalId {
        external_id: String,
        first: usize,
        second: usize,
    },
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment extraction or merge error.
    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// A required configuration value is not set.
    #[error("configuration value '{field}' is not set")]
    NotConfigured { field: &'static str },

    /// A configuration value is set but unusable.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}
