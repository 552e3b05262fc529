//! Sync reporter.
//!
//! Accumulates one entry per roster student plus run-level counts. The report
//! never decides severity; callers decide what to surface and to whom.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use fpsync_core::SchoolYearId;

use crate::error::{io_err, SyncError};
use crate::reconcile::{Action, Outcome, RecordFailure, RecordOutcome};

/// Per-outcome tallies. Dry-run decisions count under the action planned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub created: usize,
    pub re_enrolled: usize,
    pub transferred: usize,
    pub unchanged: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub school_year_id: SchoolYearId,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub counts: OutcomeCounts,
    pub entries: Vec<Outcome>,
    pub failures: Vec<RecordFailure>,
}

impl SyncReport {
    pub fn new(school_year_id: SchoolYearId, dry_run: bool) -> Self {
        Self {
            school_year_id,
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            counts: OutcomeCounts::default(),
            entries: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            Ok(entry) => {
                match entry.action {
                    Action::Create { .. } => self.counts.created += 1,
                    Action::ReEnroll { .. } => self.counts.re_enrolled += 1,
                    Action::Transfer { .. } => self.counts.transferred += 1,
                    Action::NoOp => self.counts.unchanged += 1,
                }
                self.entries.push(entry);
            }
            Err(failure) => {
                self.counts.failed += 1;
                self.failures.push(failure);
            }
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Roster students accounted for, successful or not.
    pub fn total(&self) -> usize {
        self.entries.len() + self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// One-line summary, e.g. `year 2024: 3 created, 1 re-enrolled, ...`.
    pub fn summary_line(&self) -> String {
        let c = &self.counts;
        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        format!(
            "{prefix}year {}: {} created, {} re-enrolled, {} transferred, {} unchanged, {} failed ({} students)",
            self.school_year_id,
            c.created,
            c.re_enrolled,
            c.transferred,
            c.unchanged,
            c.failed,
            self.total(),
        )
    }

    pub fn file_name(&self) -> String {
        format!("sync-report-{}.json", self.started_at.format("%Y%m%dT%H%M%SZ"))
    }
}

/// Save `report` under `dir` as pretty JSON. Writes `<file>.tmp` then renames.
pub fn save_at(dir: &Path, report: &SyncReport) -> Result<PathBuf, SyncError> {
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let path = dir.join(report.file_name());
    let json = serde_json::to_string_pretty(report)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(path)
}
