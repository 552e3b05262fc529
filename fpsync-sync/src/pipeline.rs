//! Shared sync entrypoint: fetch -> match -> reconcile -> report.

use fpsync_client::DirectoryClient;
use fpsync_core::{AppConfig, LocalStudentRecord, SchoolYearId};

use crate::error::SyncError;
use crate::matcher::SnapshotIndex;
use crate::reconcile::Reconciler;
use crate::report::SyncReport;
use crate::snapshot;

/// Parameters for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub school_year_id: SchoolYearId,
    pub first_year: Option<SchoolYearId>,
    pub dry_run: bool,
}

impl SyncOptions {
    pub fn from_config(config: &AppConfig, dry_run: bool) -> Result<Self, SyncError> {
        Ok(Self {
            school_year_id: config.target_year()?,
            first_year: config.first_year()?,
            dry_run,
        })
    }
}

/// Run one reconciliation pass over an already-loaded roster.
///
/// A fetch failure aborts before any write. Per-record failures land in the
/// report and never stop the loop.
pub fn run<C: DirectoryClient + ?Sized>(
    client: &C,
    roster: Vec<LocalStudentRecord>,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    let mut report = SyncReport::new(options.school_year_id, options.dry_run);

    let snapshot = snapshot::fetch(client, options.school_year_id, options.first_year)?;
    let index = SnapshotIndex::build(&snapshot);
    let merged = index.merge(roster);

    tracing::info!("reconciling {} students", merged.len());
    let reconciler = Reconciler::new(client, options.dry_run);
    for record in &merged {
        let enrollments = index.enrollments_for(record.external_id());
        report.record(reconciler.reconcile(record, enrollments));
    }

    report.finish();
    tracing::info!("{}", report.summary_line());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use fpsync_client::{InMemoryDirectory, WriteCall};
    use fpsync_core::{ExternalId, GradeId, SchoolId};

    use super::*;
    use crate::reconcile::{Action, FailureKind};

    const YEAR: SchoolYearId = SchoolYearId(2024);

    fn options(dry_run: bool) -> SyncOptions {
        SyncOptions {
            school_year_id: YEAR,
            first_year: None,
            dry_run,
        }
    }

    fn district() -> InMemoryDirectory {
        InMemoryDirectory::new()
            .with_year(2023, "2023-2024")
            .with_year(2024, "2024-2025")
            .with_school(1, "Lincoln")
            .with_school(2, "Washington")
    }

    fn student(id: &str, school: &str) -> LocalStudentRecord {
        LocalStudentRecord {
            external_id: ExternalId::parse(id).unwrap(),
            first_name: "Student".into(),
            last_name: id.into(),
            school_name: school.into(),
            grade_id: GradeId(3),
            class_id: None,
            school_year_id: YEAR,
        }
    }

    #[test]
    fn unknown_student_is_created_at_lincoln() {
        let dir = district();
        let report = run(&dir, vec![student("55", "Lincoln")], &options(false)).unwrap();
        assert_eq!(report.counts.created, 1);
        assert_eq!(
            dir.calls(),
            vec![WriteCall::Create {
                external_id: ExternalId::Numeric(55),
                school_id: SchoolId(1),
                school_year_id: YEAR,
                grade_id: GradeId(3),
            }]
        );
    }

    #[test]
    fn prior_year_only_is_re_enrolled() {
        let dir = district().with_enrollment(900, "55", 1, 2023);
        let report = run(&dir, vec![student("55", "Lincoln")], &options(false)).unwrap();
        assert_eq!(report.counts.re_enrolled, 1);
        assert_eq!(report.counts.transferred, 0);
        assert!(matches!(dir.calls()[0], WriteCall::Enroll { .. }));
    }

    #[test]
    fn washington_to_lincoln_is_a_transfer() {
        let dir = district().with_enrollment(900, "55", 2, 2024);
        let report = run(&dir, vec![student("55", "Lincoln")], &options(false)).unwrap();
        assert_eq!(report.counts.transferred, 1);
        assert!(matches!(
            dir.calls()[0],
            WriteCall::Transfer {
                from_school_id: SchoolId(2),
                to_school_id: SchoolId(1),
                ..
            }
        ));
    }

    #[test]
    fn one_failure_does_not_stop_the_run() {
        let dir = district()
            .with_enrollment(900, "55", 2, 2024)
            .fail_writes_for(ExternalId::Numeric(55));
        let roster = vec![
            student("55", "Lincoln"),
            student("56", "Lincoln"),
            student("57", "Nowhere"),
        ];
        let report = run(&dir, roster, &options(false)).unwrap();

        assert_eq!(report.counts.created, 1);
        assert_eq!(report.counts.failed, 2);
        let kinds: Vec<_> = report.failures.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FailureKind::Transfer, FailureKind::SchoolResolution]);
        assert_eq!(dir.calls().len(), 2);
    }

    #[test]
    fn second_run_is_all_noop() {
        let dir = district()
            .with_enrollment(900, "55", 2, 2024)
            .with_enrollment(901, "56", 1, 2023);
        let roster = vec![
            student("55", "Lincoln"),
            student("56", "Lincoln"),
            student("57", "Washington"),
        ];

        let first = run(&dir, roster.clone(), &options(false)).unwrap();
        assert_eq!(first.counts.failed, 0);
        let writes = dir.calls().len();
        assert_eq!(writes, 3);

        let second = run(&dir, roster, &options(false)).unwrap();
        assert_eq!(second.counts.unchanged, 3);
        assert_eq!(dir.calls().len(), writes);
    }

    #[test]
    fn dry_run_plans_without_writing() {
        let dir = district().with_enrollment(900, "55", 2, 2024);
        let report = run(
            &dir,
            vec![student("55", "Lincoln"), student("56", "Lincoln")],
            &options(true),
        )
        .unwrap();

        assert!(dir.calls().is_empty());
        assert!(report.dry_run);
        assert!(matches!(report.entries[0].action, Action::Transfer { .. }));
        assert!(matches!(report.entries[1].action, Action::Create { .. }));
        assert!(report.entries.iter().all(|e| !e.applied));
    }

    #[test]
    fn fetch_failure_aborts_before_any_write() {
        let dir = district().fail_enrollment_fetch(2, 2023);
        let err = run(&dir, vec![student("55", "Lincoln")], &options(false)).unwrap_err();
        assert!(matches!(err, SyncError::Fetch { .. }));
        assert!(dir.calls().is_empty());
    }

    #[test]
    fn float_and_text_ids_join() {
        let dir = district().with_enrollment(900, "123", 1, 2024);
        let mut record = student("123", "Lincoln");
        record.external_id = ExternalId::from_f64(123.0);
        let report = run(&dir, vec![record], &options(false)).unwrap();
        assert_eq!(report.counts.unchanged, 1);
    }
}
