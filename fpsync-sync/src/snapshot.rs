//! Remote snapshot fetcher.
//!
//! Pulls years, the district's schools, and the enrollments of every
//! (school, year) pair into one flat collection. Any failed call aborts the
//! fetch: reconciliation decisions assume the snapshot is complete.

use fpsync_client::DirectoryClient;
use fpsync_core::{AcademicYear, RemoteEnrollment, School, SchoolYearId};

use crate::error::{fetch_err, SyncError};

/// Everything the remote platform knows, as of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub years: Vec<AcademicYear>,
    pub schools: Vec<School>,
    /// Enrollment rows in fetch order (year-major, then school).
    pub enrollments: Vec<RemoteEnrollment>,
}

/// Fetch a complete snapshot for `target`.
///
/// Years older than `first_year` are skipped. The target year itself must be
/// known to the platform, otherwise every student would look unenrolled.
pub fn fetch<C: DirectoryClient + ?Sized>(
    client: &C,
    target: SchoolYearId,
    first_year: Option<SchoolYearId>,
) -> Result<RemoteSnapshot, SyncError> {
    tracing::info!("pulling all years");
    let years: Vec<AcademicYear> = client
        .list_years()
        .map_err(|e| fetch_err("list years", e))?
        .into_iter()
        .filter(|y| first_year.map_or(true, |first| y.id >= first))
        .collect();
    if !years.iter().any(|y| y.id == target) {
        return Err(SyncError::UnknownYear(target));
    }

    tracing::info!("pulling schools for year {target}");
    let schools = client
        .list_schools(target)
        .map_err(|e| fetch_err(format!("list schools for year {target}"), e))?;

    tracing::info!(
        "pulling enrollments for {} years x {} schools",
        years.len(),
        schools.len()
    );
    let mut enrollments = Vec::new();
    for year in &years {
        tracing::info!("  {}", year.name);
        for school in &schools {
            let rows = client.list_enrollments(school.id, year.id).map_err(|e| {
                fetch_err(
                    format!("list enrollments for school {} year {}", school.id, year.id),
                    e,
                )
            })?;
            tracing::debug!("    {}: {} rows", school.name, rows.len());
            enrollments.extend(rows);
        }
    }

    Ok(RemoteSnapshot {
        years,
        schools,
        enrollments,
    })
}
