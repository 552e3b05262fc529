//! Error types for fpsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use fpsync_client::ClientError;
use fpsync_core::{ConfigError, RosterError, SchoolYearId};

/// Run-level errors. Every variant aborts the run; per-record failures are
/// reported through [`crate::reconcile::RecordFailure`] instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The roster could not be loaded.
    #[error("roster error: {0}")]
    Roster(#[from] RosterError),

    /// Configuration is incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A read against the remote platform failed; the snapshot is incomplete.
    #[error("remote fetch failed ({operation}): {source}")]
    Fetch {
        operation: String,
        #[source]
        source: ClientError,
    },

    /// The target year is missing from the platform's year list.
    #[error("academic year {0} is not known to the remote platform")]
    UnknownYear(SchoolYearId),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (reports, hash store, class files).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The blocking runtime for uploads could not be started.
    #[error("could not start upload runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// Object storage rejected a blob or could not be configured.
    #[error("object storage error for '{key}': {source}")]
    Storage {
        key: String,
        #[source]
        source: object_store::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::Fetch`].
pub(crate) fn fetch_err(operation: impl Into<String>, source: ClientError) -> SyncError {
    SyncError::Fetch {
        operation: operation.into(),
        source,
    }
}
