//! Identity matcher.
//!
//! Builds the per-run lookup tables once (external id -> remote id,
//! external id -> enrollments, school name -> school id) and left-joins the
//! roster onto them.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use fpsync_core::{
    ExternalId, LocalStudentRecord, MergedRecord, RemoteEnrollment, RemoteStudentId, SchoolId,
};

use crate::snapshot::RemoteSnapshot;

/// Lookup tables over one [`RemoteSnapshot`].
#[derive(Debug, Default)]
pub struct SnapshotIndex {
    remote_ids: HashMap<ExternalId, RemoteStudentId>,
    enrollments: HashMap<ExternalId, Vec<RemoteEnrollment>>,
    schools: HashMap<String, SchoolId>,
}

impl SnapshotIndex {
    pub fn build(snapshot: &RemoteSnapshot) -> Self {
        let mut index = Self::default();
        let mut pairs: HashSet<(RemoteStudentId, &ExternalId)> = HashSet::new();
        let mut unidentified = 0usize;

        for enrollment in &snapshot.enrollments {
            let Some(external_id) = &enrollment.external_id else {
                tracing::debug!(
                    "remote student {} at school {} has no studentIdentifier",
                    enrollment.remote_student_id,
                    enrollment.school_id,
                );
                unidentified += 1;
                continue;
            };
            index
                .enrollments
                .entry(external_id.clone())
                .or_default()
                .push(enrollment.clone());

            if !pairs.insert((enrollment.remote_student_id, external_id)) {
                continue;
            }
            match index.remote_ids.entry(external_id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(enrollment.remote_student_id);
                }
                Entry::Occupied(kept) => {
                    tracing::warn!(
                        "studentIdentifier {} is held by remote students {} and {}; keeping {}",
                        external_id,
                        kept.get(),
                        enrollment.remote_student_id,
                        kept.get(),
                    );
                }
            }
        }
        if unidentified > 0 {
            tracing::warn!(
                "skipped {unidentified} remote enrollment rows without a studentIdentifier"
            );
        }

        for school in &snapshot.schools {
            index
                .schools
                .entry(school.name.clone())
                .or_insert(school.id);
        }

        index
    }

    /// Left-join the roster, preserving roster order.
    pub fn merge(&self, roster: Vec<LocalStudentRecord>) -> Vec<MergedRecord> {
        let merged: Vec<MergedRecord> = roster
            .into_iter()
            .map(|student| MergedRecord {
                remote_student_id: self.remote_id(&student.external_id),
                school_id: self.school_id(&student.school_name),
                student,
            })
            .collect();

        let matched = merged
            .iter()
            .filter(|r| r.remote_student_id.is_some())
            .count();
        tracing::info!(
            "matched {matched} of {} roster students to remote records",
            merged.len()
        );
        merged
    }

    pub fn remote_id(&self, external_id: &ExternalId) -> Option<RemoteStudentId> {
        self.remote_ids.get(external_id).copied()
    }

    /// Exact, case-sensitive school name lookup.
    pub fn school_id(&self, name: &str) -> Option<SchoolId> {
        self.schools.get(name).copied()
    }

    /// All enrollments on file for a student, in fetch order.
    pub fn enrollments_for(&self, external_id: &ExternalId) -> &[RemoteEnrollment] {
        self.enrollments
            .get(external_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
