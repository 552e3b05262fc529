//! Error types for fpsync-client.

use fpsync_core::{RemoteStudentId, SchoolId};
use thiserror::Error;

/// All errors that can arise from remote directory calls.
///
/// The read side only ever produces `Transport`, `Status`, `Decode` and
/// `Auth`; the write-specific variants are how the platform rejects a
/// mutation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced an HTTP response.
    #[error("{operation}: transport error: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    /// Non-success status not covered by a more specific variant.
    #[error("{operation}: HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The response body was not the expected JSON.
    #[error("{operation}: failed to decode response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The platform refused the credentials.
    #[error("login rejected for {email}: {message}")]
    Auth { email: String, message: String },

    /// A student with this identifier already exists remotely.
    #[error("student {external_id} already exists: {message}")]
    DuplicateStudent { external_id: String, message: String },

    /// The platform rejected the request body.
    #[error("request rejected: {message}")]
    Validation { message: String },

    /// The student already holds a conflicting enrollment.
    #[error("enrollment conflict for student {remote_student_id}: {message}")]
    EnrollmentConflict {
        remote_student_id: RemoteStudentId,
        message: String,
    },

    /// Moving the student between schools failed.
    #[error("transfer of student {remote_student_id} from school {from} to school {to} failed: {message}")]
    Transfer {
        remote_student_id: RemoteStudentId,
        from: SchoolId,
        to: SchoolId,
        message: String,
    },
}

impl ClientError {
    /// Stable machine-readable label, used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateStudent { .. } => "duplicate_student",
            Self::Validation { .. } => "validation",
            Self::EnrollmentConflict { .. } => "enrollment_conflict",
            Self::Transfer { .. } => "transfer",
            Self::Auth { .. } => "auth",
            Self::Transport { .. } | Self::Status { .. } | Self::Decode { .. } => "remote",
        }
    }
}
