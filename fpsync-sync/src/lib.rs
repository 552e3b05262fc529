//! # fpsync-sync
//!
//! Roster reconciliation and assessment export.
//!
//! Call [`pipeline::run`] with a loaded roster to bring the remote directory
//! in line with it, or [`export::run`] to stage and upload the year's
//! assessment exports.

pub mod error;
pub mod export;
pub mod hash_store;
pub mod matcher;
pub mod notify;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod snapshot;
pub mod writer;

pub use error::SyncError;
pub use export::{ExtractOptions, ExtractReport, Uploader};
pub use notify::{notify_best_effort, Notifier};
pub use pipeline::{run, SyncOptions};
pub use reconcile::{Action, FailureKind, Outcome, RecordFailure, RecordOutcome, Reconciler};
pub use report::SyncReport;
pub use snapshot::RemoteSnapshot;
