//! In-process directory that behaves like the platform.
//!
//! Writes mutate the directory's own enrollment table, so a second sync run
//! against the same instance observes the first run's effects. Every write
//! attempt (successful or not) is recorded as a [`WriteCall`].

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};

use fpsync_core::{
    AcademicYear, ClassId, ExternalId, GradeId, RemoteEnrollment, RemoteStudentId, School,
    SchoolId, SchoolYearId,
};

use crate::api::{
    DirectoryClient, EnrollmentRequest, ExportClient, ExportFile, NewStudent, TransferRequest,
};
use crate::error::ClientError;

/// A write attempted against the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCall {
    Create {
        external_id: ExternalId,
        school_id: SchoolId,
        school_year_id: SchoolYearId,
        grade_id: GradeId,
    },
    Enroll {
        remote_student_id: RemoteStudentId,
        school_id: SchoolId,
        school_year_id: SchoolYearId,
        grade_id: GradeId,
        class_id: Option<ClassId>,
    },
    Transfer {
        remote_student_id: RemoteStudentId,
        from_school_id: SchoolId,
        to_school_id: SchoolId,
        grade_id: GradeId,
    },
}

#[derive(Debug, Default)]
struct State {
    years: Vec<AcademicYear>,
    schools: Vec<School>,
    enrollments: Vec<RemoteEnrollment>,
    classes: HashMap<SchoolId, Vec<Map<String, Value>>>,
    exports: HashMap<String, String>,
    failing_students: HashSet<ExternalId>,
    failing_fetches: HashSet<(SchoolId, SchoolYearId)>,
    calls: Vec<WriteCall>,
    next_id: i64,
}

#[derive(Debug)]
pub struct InMemoryDirectory {
    state: Mutex<State>,
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 10_000,
                ..State::default()
            }),
        }
    }

    pub fn with_year(self, id: i64, name: &str) -> Self {
        self.lock().years.push(AcademicYear {
            id: SchoolYearId(id),
            name: name.to_string(),
        });
        self
    }

    pub fn with_school(self, id: i64, name: &str) -> Self {
        self.lock().schools.push(School {
            id: SchoolId(id),
            name: name.to_string(),
            school_year_id: None,
        });
        self
    }

    /// A blank `external_id` stores a row the platform holds no identifier for.
    pub fn with_enrollment(self, remote_id: i64, external_id: &str, school: i64, year: i64) -> Self {
        self.lock().enrollments.push(RemoteEnrollment {
            remote_student_id: RemoteStudentId(remote_id),
            external_id: ExternalId::parse(external_id),
            school_id: SchoolId(school),
            school_year_id: SchoolYearId(year),
        });
        self
    }

    pub fn with_classes(self, school: i64, classes: Vec<Map<String, Value>>) -> Self {
        self.lock().classes.insert(SchoolId(school), classes);
        self
    }

    pub fn with_export(self, kind: &str, data: &str) -> Self {
        self.lock().exports.insert(kind.to_string(), data.to_string());
        self
    }

    /// Every write for this student is rejected with the operation's error.
    pub fn fail_writes_for(self, external_id: ExternalId) -> Self {
        self.lock().failing_students.insert(external_id);
        self
    }

    /// Listing enrollments for this (school, year) pair fails.
    pub fn fail_enrollment_fetch(self, school: i64, year: i64) -> Self {
        self.lock()
            .failing_fetches
            .insert((SchoolId(school), SchoolYearId(year)));
        self
    }

    /// Write attempts so far, in order.
    pub fn calls(&self) -> Vec<WriteCall> {
        self.lock().calls.clone()
    }

    pub fn enrollments(&self) -> Vec<RemoteEnrollment> {
        self.lock().enrollments.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-call; the data is
        // still a usable snapshot.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl State {
    fn external_id_of(&self, remote: RemoteStudentId) -> Option<ExternalId> {
        self.enrollments
            .iter()
            .find(|e| e.remote_student_id == remote && e.external_id.is_some())
            .and_then(|e| e.external_id.clone())
    }

    fn is_known(&self, remote: RemoteStudentId) -> bool {
        self.enrollments.iter().any(|e| e.remote_student_id == remote)
    }

    fn is_failing(&self, remote: RemoteStudentId) -> bool {
        self.external_id_of(remote)
            .is_some_and(|id| self.failing_students.contains(&id))
    }
}

impl DirectoryClient for InMemoryDirectory {
    fn list_years(&self) -> Result<Vec<AcademicYear>, ClientError> {
        Ok(self.lock().years.clone())
    }

    fn list_schools(&self, _year: SchoolYearId) -> Result<Vec<School>, ClientError> {
        Ok(self.lock().schools.clone())
    }

    fn list_enrollments(
        &self,
        school: SchoolId,
        year: SchoolYearId,
    ) -> Result<Vec<RemoteEnrollment>, ClientError> {
        let state = self.lock();
        if state.failing_fetches.contains(&(school, year)) {
            return Err(ClientError::Status {
                operation: "list enrollments",
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(state
            .enrollments
            .iter()
            .filter(|e| e.school_id == school && e.school_year_id == year)
            .cloned()
            .collect())
    }

    fn create_student(&self, request: &NewStudent) -> Result<RemoteStudentId, ClientError> {
        let mut state = self.lock();
        state.calls.push(WriteCall::Create {
            external_id: request.external_id.clone(),
            school_id: request.school_id,
            school_year_id: request.school_year_id,
            grade_id: request.grade_id,
        });

        if state.failing_students.contains(&request.external_id) {
            return Err(ClientError::Validation {
                message: format!("student {} rejected", request.external_id),
            });
        }
        if state
            .enrollments
            .iter()
            .any(|e| e.external_id.as_ref() == Some(&request.external_id))
        {
            return Err(ClientError::DuplicateStudent {
                external_id: request.external_id.to_string(),
                message: "studentIdentifier already in use".to_string(),
            });
        }

        state.next_id += 1;
        let id = RemoteStudentId(state.next_id);
        state.enrollments.push(RemoteEnrollment {
            remote_student_id: id,
            external_id: Some(request.external_id.clone()),
            school_id: request.school_id,
            school_year_id: request.school_year_id,
        });
        Ok(id)
    }

    fn enroll_student(&self, request: &EnrollmentRequest) -> Result<(), ClientError> {
        let mut state = self.lock();
        state.calls.push(WriteCall::Enroll {
            remote_student_id: request.remote_student_id,
            school_id: request.school_id,
            school_year_id: request.school_year_id,
            grade_id: request.grade_id,
            class_id: request.class_id,
        });

        let conflict = state.enrollments.iter().any(|e| {
            e.remote_student_id == request.remote_student_id
                && e.school_year_id == request.school_year_id
        });
        if conflict || state.is_failing(request.remote_student_id) {
            return Err(ClientError::EnrollmentConflict {
                remote_student_id: request.remote_student_id,
                message: format!("already enrolled in year {}", request.school_year_id),
            });
        }
        if !state.is_known(request.remote_student_id) {
            return Err(ClientError::Validation {
                message: format!("unknown student {}", request.remote_student_id),
            });
        }

        let external_id = state.external_id_of(request.remote_student_id);
        state.enrollments.push(RemoteEnrollment {
            remote_student_id: request.remote_student_id,
            external_id,
            school_id: request.school_id,
            school_year_id: request.school_year_id,
        });
        Ok(())
    }

    fn transfer_student(&self, request: &TransferRequest) -> Result<(), ClientError> {
        let mut state = self.lock();
        state.calls.push(WriteCall::Transfer {
            remote_student_id: request.remote_student_id,
            from_school_id: request.from_school_id,
            to_school_id: request.to_school_id,
            grade_id: request.grade_id,
        });

        let failing = state.is_failing(request.remote_student_id);
        let latest = state
            .enrollments
            .iter_mut()
            .filter(|e| {
                e.remote_student_id == request.remote_student_id
                    && e.school_id == request.from_school_id
            })
            .max_by_key(|e| e.school_year_id);
        match latest {
            Some(enrollment) if !failing => {
                enrollment.school_id = request.to_school_id;
                Ok(())
            }
            _ => Err(ClientError::Transfer {
                remote_student_id: request.remote_student_id,
                from: request.from_school_id,
                to: request.to_school_id,
                message: "student is not enrolled at the source school".to_string(),
            }),
        }
    }
}

impl ExportClient for InMemoryDirectory {
    fn list_classes(
        &self,
        school: SchoolId,
        _year: SchoolYearId,
    ) -> Result<Vec<Map<String, Value>>, ClientError> {
        Ok(self.lock().classes.get(&school).cloned().unwrap_or_default())
    }

    fn fetch_export(&self, kind: &str, year: SchoolYearId) -> Result<ExportFile, ClientError> {
        let state = self.lock();
        let data = state.exports.get(kind).ok_or_else(|| ClientError::Status {
            operation: "fetch export",
            status: 404,
            body: format!("unknown export '{kind}'"),
        })?;
        Ok(ExportFile {
            kind: kind.to_string(),
            filename: format!("{kind}_{year}.csv"),
            data: data.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_student(id: i64) -> NewStudent {
        NewStudent {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            external_id: ExternalId::Numeric(id),
            school_id: SchoolId(1),
            school_year_id: SchoolYearId(2024),
            grade_id: GradeId(3),
        }
    }

    #[test]
    fn create_adds_an_enrollment() {
        let dir = InMemoryDirectory::new().with_school(1, "Lincoln");
        let id = dir.create_student(&new_student(55)).unwrap();
        let listed = dir.list_enrollments(SchoolId(1), SchoolYearId(2024)).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].remote_student_id, id);
    }

    #[test]
    fn second_create_is_a_duplicate() {
        let dir = InMemoryDirectory::new();
        dir.create_student(&new_student(55)).unwrap();
        let err = dir.create_student(&new_student(55)).unwrap_err();
        assert!(matches!(err, ClientError::DuplicateStudent { .. }));
        assert_eq!(dir.calls().len(), 2);
    }

    #[test]
    fn transfer_moves_latest_enrollment() {
        let dir = InMemoryDirectory::new()
            .with_enrollment(7, "55", 1, 2023)
            .with_enrollment(7, "55", 1, 2024);
        dir.transfer_student(&TransferRequest {
            from_school_id: SchoolId(1),
            to_school_id: SchoolId(2),
            remote_student_id: RemoteStudentId(7),
            grade_id: GradeId(3),
        })
        .unwrap();
        let moved = dir.list_enrollments(SchoolId(2), SchoolYearId(2024)).unwrap();
        assert_eq!(moved.len(), 1);
        assert_eq!(
            dir.list_enrollments(SchoolId(1), SchoolYearId(2023))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn blank_identifier_is_stored_as_none() {
        let dir = InMemoryDirectory::new().with_enrollment(8, " ", 1, 2024);
        let listed = dir.list_enrollments(SchoolId(1), SchoolYearId(2024)).unwrap();
        assert_eq!(listed[0].external_id, None);
    }

    #[test]
    fn injected_fetch_failure() {
        let dir = InMemoryDirectory::new().fail_enrollment_fetch(1, 2024);
        assert!(dir.list_enrollments(SchoolId(1), SchoolYearId(2024)).is_err());
        assert!(dir.list_enrollments(SchoolId(1), SchoolYearId(2023)).is_ok());
    }
}
