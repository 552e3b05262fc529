//! Enrollment reconciler.
//!
//! ## Decision table
//!
//! For a merged record targeting school `S` in year `Y`:
//!
//! 1. school name unresolved          -> failure (`school_resolution`), no write
//! 2. no remote student               -> `Create`
//! 3. no enrollment in `Y` anywhere   -> `ReEnroll`
//! 4. enrolled in `Y`, none at `S`    -> `Transfer` from the last current-year
//!    enrollment in fetch order
//! 5. enrolled in `Y` at `S`          -> `NoOp`
//!
//! Each record issues at most one write. Write failures come back as
//! [`RecordFailure`] values; nothing here aborts the run or retries.

use std::collections::BTreeSet;

use serde::Serialize;

use fpsync_client::{
    ClientError, DirectoryClient, EnrollmentRequest, NewStudent, TransferRequest,
};
use fpsync_core::{ExternalId, MergedRecord, RemoteEnrollment, RemoteStudentId, SchoolId};

/// What the reconciler decided for one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Create {
        school_id: SchoolId,
    },
    ReEnroll {
        remote_student_id: RemoteStudentId,
        school_id: SchoolId,
    },
    Transfer {
        remote_student_id: RemoteStudentId,
        from_school_id: SchoolId,
        to_school_id: SchoolId,
    },
    NoOp,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Create { .. } => "CREATE",
            Self::ReEnroll { .. } => "RE-ENROLL",
            Self::Transfer { .. } => "TRANSFER",
            Self::NoOp => "NO-OP",
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Self::NoOp)
    }
}

/// Machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SchoolResolution,
    DuplicateStudent,
    Validation,
    EnrollmentConflict,
    Transfer,
    Remote,
}

impl From<&ClientError> for FailureKind {
    fn from(err: &ClientError) -> Self {
        match err {
            ClientError::DuplicateStudent { .. } => Self::DuplicateStudent,
            ClientError::Validation { .. } => Self::Validation,
            ClientError::EnrollmentConflict { .. } => Self::EnrollmentConflict,
            ClientError::Transfer { .. } => Self::Transfer,
            _ => Self::Remote,
        }
    }
}

/// A student the run could not bring in line, attributed to the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub external_id: ExternalId,
    pub name: String,
    /// The write that was attempted; `None` when no write was possible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempted: Option<Action>,
    pub kind: FailureKind,
    pub message: String,
}

impl RecordFailure {
    fn unresolved_school(record: &MergedRecord) -> Self {
        Self {
            external_id: record.external_id().clone(),
            name: record.student.display_name(),
            attempted: None,
            kind: FailureKind::SchoolResolution,
            message: format!("no school named '{}'", record.student.school_name),
        }
    }

    fn write(record: &MergedRecord, action: Action, err: &ClientError) -> Self {
        Self {
            external_id: record.external_id().clone(),
            name: record.student.display_name(),
            attempted: Some(action),
            kind: FailureKind::from(err),
            message: err.to_string(),
        }
    }
}

/// A student the run handled, whether or not a write was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub external_id: ExternalId,
    pub name: String,
    #[serde(flatten)]
    pub action: Action,
    /// Remote id after the run; freshly assigned for applied creates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_student_id: Option<RemoteStudentId>,
    /// `false` for no-ops and for every decision of a dry run.
    pub applied: bool,
}

pub type RecordOutcome = Result<Outcome, RecordFailure>;

/// Decide what `record` needs, given every enrollment on file for its
/// external id (in fetch order). Pure; issues no remote calls.
pub fn plan(
    record: &MergedRecord,
    enrollments: &[RemoteEnrollment],
) -> Result<Action, RecordFailure> {
    let Some(school_id) = record.school_id else {
        return Err(RecordFailure::unresolved_school(record));
    };
    let Some(remote_student_id) = record.remote_student_id else {
        return Ok(Action::Create { school_id });
    };

    let year = record.student.school_year_id;
    let current_year: Vec<&RemoteEnrollment> = enrollments
        .iter()
        .filter(|e| e.school_year_id == year)
        .collect();

    let Some(source) = current_year.last() else {
        return Ok(Action::ReEnroll {
            remote_student_id,
            school_id,
        });
    };
    if current_year.iter().any(|e| e.school_id == school_id) {
        return Ok(Action::NoOp);
    }

    let schools: BTreeSet<SchoolId> = current_year.iter().map(|e| e.school_id).collect();
    if schools.len() > 1 {
        tracing::warn!(
            "student {} is enrolled at {} schools in year {year}; transferring from the last seen ({})",
            record.external_id(),
            schools.len(),
            source.school_id,
        );
    }
    Ok(Action::Transfer {
        remote_student_id,
        from_school_id: source.school_id,
        to_school_id: school_id,
    })
}

/// Applies planned actions through a [`DirectoryClient`].
pub struct Reconciler<'a, C: ?Sized> {
    client: &'a C,
    dry_run: bool,
}

impl<'a, C: DirectoryClient + ?Sized> Reconciler<'a, C> {
    pub fn new(client: &'a C, dry_run: bool) -> Self {
        Self { client, dry_run }
    }

    /// Plan and, unless dry-running, apply the one write `record` needs.
    pub fn reconcile(&self, record: &MergedRecord, enrollments: &[RemoteEnrollment]) -> RecordOutcome {
        let action = plan(record, enrollments).map_err(|failure| {
            tracing::warn!("{} {}: {}", failure.name, failure.external_id, failure.message);
            failure
        })?;
        let name = record.student.display_name();

        if !action.is_write() || self.dry_run {
            tracing::debug!("{name} {}: {}", record.external_id(), action.label());
            return Ok(Outcome {
                external_id: record.external_id().clone(),
                name,
                action,
                remote_student_id: record.remote_student_id,
                applied: false,
            });
        }

        tracing::info!("{name} {}: {}", record.external_id(), action.label());
        match self.apply(record, &action) {
            Ok(remote_student_id) => Ok(Outcome {
                external_id: record.external_id().clone(),
                name,
                action,
                remote_student_id,
                applied: true,
            }),
            Err(err) => {
                tracing::error!("{name} {}: {} failed: {err}", record.external_id(), action.label());
                Err(RecordFailure::write(record, action, &err))
            }
        }
    }

    fn apply(
        &self,
        record: &MergedRecord,
        action: &Action,
    ) -> Result<Option<RemoteStudentId>, ClientError> {
        let student = &record.student;
        match *action {
            Action::Create { school_id } => {
                let id = self.client.create_student(&NewStudent {
                    first_name: student.first_name.clone(),
                    last_name: student.last_name.clone(),
                    external_id: student.external_id.clone(),
                    school_id,
                    school_year_id: student.school_year_id,
                    grade_id: student.grade_id,
                })?;
                Ok(Some(id))
            }
            Action::ReEnroll {
                remote_student_id,
                school_id,
            } => {
                self.client.enroll_student(&EnrollmentRequest {
                    remote_student_id,
                    school_id,
                    school_year_id: student.school_year_id,
                    grade_id: student.grade_id,
                    class_id: student.class_id,
                })?;
                Ok(Some(remote_student_id))
            }
            Action::Transfer {
                remote_student_id,
                from_school_id,
                to_school_id,
            } => {
                self.client.transfer_student(&TransferRequest {
                    from_school_id,
                    to_school_id,
                    remote_student_id,
                    grade_id: student.grade_id,
                })?;
                Ok(Some(remote_student_id))
            }
            Action::NoOp => Ok(record.remote_student_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use fpsync_client::{InMemoryDirectory, WriteCall};
    use fpsync_core::{ClassId, GradeId, LocalStudentRecord, SchoolYearId};

    use super::*;

    const LINCOLN: SchoolId = SchoolId(1);
    const WASHINGTON: SchoolId = SchoolId(2);
    const ADAMS: SchoolId = SchoolId(3);

    fn record(remote: Option<i64>, school: Option<SchoolId>) -> MergedRecord {
        MergedRecord {
            student: LocalStudentRecord {
                external_id: ExternalId::Numeric(55),
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                school_name: "Lincoln".into(),
                grade_id: GradeId(3),
                class_id: Some(ClassId(12)),
                school_year_id: SchoolYearId(2024),
            },
            remote_student_id: remote.map(RemoteStudentId),
            school_id: school,
        }
    }

    fn enrollment(school: SchoolId, year: i64) -> RemoteEnrollment {
        RemoteEnrollment {
            remote_student_id: RemoteStudentId(900),
            external_id: Some(ExternalId::Numeric(55)),
            school_id: school,
            school_year_id: SchoolYearId(year),
        }
    }

    #[test]
    fn unknown_student_is_created() {
        let action = plan(&record(None, Some(LINCOLN)), &[]).unwrap();
        assert_eq!(action, Action::Create { school_id: LINCOLN });
    }

    #[test]
    fn prior_year_only_is_re_enrolled_not_transferred() {
        let action = plan(
            &record(Some(900), Some(LINCOLN)),
            &[enrollment(WASHINGTON, 2023)],
        )
        .unwrap();
        assert_eq!(
            action,
            Action::ReEnroll {
                remote_student_id: RemoteStudentId(900),
                school_id: LINCOLN
            }
        );
    }

    #[test]
    fn current_year_elsewhere_is_transferred() {
        let action = plan(
            &record(Some(900), Some(LINCOLN)),
            &[enrollment(LINCOLN, 2023), enrollment(WASHINGTON, 2024)],
        )
        .unwrap();
        assert_eq!(
            action,
            Action::Transfer {
                remote_student_id: RemoteStudentId(900),
                from_school_id: WASHINGTON,
                to_school_id: LINCOLN
            }
        );
    }

    #[test]
    fn current_year_at_target_is_noop() {
        let action = plan(
            &record(Some(900), Some(LINCOLN)),
            &[enrollment(LINCOLN, 2024)],
        )
        .unwrap();
        assert_eq!(action, Action::NoOp);
    }

    #[test]
    fn enrolled_at_target_and_elsewhere_is_noop() {
        let action = plan(
            &record(Some(900), Some(LINCOLN)),
            &[enrollment(WASHINGTON, 2024), enrollment(LINCOLN, 2024)],
        )
        .unwrap();
        assert_eq!(action, Action::NoOp);
    }

    #[test]
    fn several_current_year_schools_transfer_from_last_seen() {
        let action = plan(
            &record(Some(900), Some(LINCOLN)),
            &[enrollment(WASHINGTON, 2024), enrollment(ADAMS, 2024)],
        )
        .unwrap();
        assert!(matches!(
            action,
            Action::Transfer {
                from_school_id: ADAMS,
                ..
            }
        ));
    }

    #[test]
    fn unresolved_school_never_reaches_a_write() {
        let dir = InMemoryDirectory::new();
        let reconciler = Reconciler::new(&dir, false);
        for remote in [None, Some(900)] {
            let failure = reconciler.reconcile(&record(remote, None), &[]).unwrap_err();
            assert_eq!(failure.kind, FailureKind::SchoolResolution);
            assert_eq!(failure.attempted, None);
        }
        assert!(dir.calls().is_empty());
    }

    #[test]
    fn create_issues_exactly_one_call() {
        let dir = InMemoryDirectory::new();
        let outcome = Reconciler::new(&dir, false)
            .reconcile(&record(None, Some(LINCOLN)), &[])
            .unwrap();
        assert!(outcome.applied);
        assert!(outcome.remote_student_id.is_some());
        assert_eq!(
            dir.calls(),
            vec![WriteCall::Create {
                external_id: ExternalId::Numeric(55),
                school_id: LINCOLN,
                school_year_id: SchoolYearId(2024),
                grade_id: GradeId(3),
            }]
        );
    }

    #[test]
    fn re_enroll_forwards_class() {
        let dir = InMemoryDirectory::new().with_enrollment(900, "55", 2, 2023);
        let history = dir.enrollments();
        Reconciler::new(&dir, false)
            .reconcile(&record(Some(900), Some(LINCOLN)), &history)
            .unwrap();
        assert_eq!(
            dir.calls(),
            vec![WriteCall::Enroll {
                remote_student_id: RemoteStudentId(900),
                school_id: LINCOLN,
                school_year_id: SchoolYearId(2024),
                grade_id: GradeId(3),
                class_id: Some(ClassId(12)),
            }]
        );
    }

    #[test]
    fn noop_issues_no_call() {
        let dir = InMemoryDirectory::new().with_enrollment(900, "55", 1, 2024);
        let history = dir.enrollments();
        let outcome = Reconciler::new(&dir, false)
            .reconcile(&record(Some(900), Some(LINCOLN)), &history)
            .unwrap();
        assert_eq!(outcome.action, Action::NoOp);
        assert!(!outcome.applied);
        assert!(dir.calls().is_empty());
    }

    #[test]
    fn dry_run_issues_no_call() {
        let dir = InMemoryDirectory::new();
        let outcome = Reconciler::new(&dir, true)
            .reconcile(&record(None, Some(LINCOLN)), &[])
            .unwrap();
        assert!(matches!(outcome.action, Action::Create { .. }));
        assert!(!outcome.applied);
        assert!(dir.calls().is_empty());
    }

    #[test]
    fn write_failure_is_attributed_to_the_record() {
        let dir = InMemoryDirectory::new()
            .with_enrollment(900, "55", 2, 2024)
            .fail_writes_for(ExternalId::Numeric(55));
        let history = dir.enrollments();
        let failure = Reconciler::new(&dir, false)
            .reconcile(&record(Some(900), Some(LINCOLN)), &history)
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Transfer);
        assert_eq!(failure.external_id, ExternalId::Numeric(55));
        assert!(matches!(failure.attempted, Some(Action::Transfer { .. })));
        assert_eq!(dir.calls().len(), 1);
    }
}
