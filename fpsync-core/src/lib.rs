//! fpsync core library: domain types, identifier canonicalization, roster
//! loading, and run configuration.
//!
//! - [`types`] — newtypes and domain structs
//! - [`external_id`] — the canonical join key between SIS and remote
//! - [`roster`] — SIS roster loader
//! - [`config`] — layered configuration
//! - [`error`] — [`RosterError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod external_id;
pub mod roster;
pub mod types;

pub use config::AppConfig;
pub use error::{ConfigError, RosterError};
pub use external_id::ExternalId;
pub use types::{
    AcademicYear, ClassId, GradeId, LocalStudentRecord, MergedRecord, RemoteEnrollment,
    RemoteStudentId, School, SchoolId, SchoolYearId,
};
