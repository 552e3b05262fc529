//! The operations the sync engine consumes from the remote platform.

use serde::Serialize;
use serde_json::{Map, Value};

use fpsync_core::{
    AcademicYear, ClassId, ExternalId, GradeId, RemoteEnrollment, RemoteStudentId, School,
    SchoolId, SchoolYearId,
};

use crate::error::ClientError;

/// Read and write access to the platform's student directory.
pub trait DirectoryClient {
    fn list_years(&self) -> Result<Vec<AcademicYear>, ClientError>;

    /// Schools of the district as of `year`.
    fn list_schools(&self, year: SchoolYearId) -> Result<Vec<School>, ClientError>;

    fn list_enrollments(
        &self,
        school: SchoolId,
        year: SchoolYearId,
    ) -> Result<Vec<RemoteEnrollment>, ClientError>;

    /// Create a student, implicitly enrolling them. Fails with
    /// [`ClientError::DuplicateStudent`] or [`ClientError::Validation`].
    fn create_student(&self, request: &NewStudent) -> Result<RemoteStudentId, ClientError>;

    /// Add an existing student to a school, grade, and optionally a class.
    /// Fails with [`ClientError::EnrollmentConflict`].
    fn enroll_student(&self, request: &EnrollmentRequest) -> Result<(), ClientError>;

    /// Move a student between schools. Fails with [`ClientError::Transfer`].
    fn transfer_student(&self, request: &TransferRequest) -> Result<(), ClientError>;
}

/// Read access to class lists and bulk assessment exports.
pub trait ExportClient {
    /// Class objects for a school, passed through untyped.
    fn list_classes(
        &self,
        school: SchoolId,
        year: SchoolYearId,
    ) -> Result<Vec<Map<String, Value>>, ClientError>;

    fn fetch_export(&self, kind: &str, year: SchoolYearId) -> Result<ExportFile, ClientError>;
}

impl<T: DirectoryClient + ?Sized> DirectoryClient for &T {
    fn list_years(&self) -> Result<Vec<AcademicYear>, ClientError> {
        (**self).list_years()
    }

    fn list_schools(&self, year: SchoolYearId) -> Result<Vec<School>, ClientError> {
        (**self).list_schools(year)
    }

    fn list_enrollments(
        &self,
        school: SchoolId,
        year: SchoolYearId,
    ) -> Result<Vec<RemoteEnrollment>, ClientError> {
        (**self).list_enrollments(school, year)
    }

    fn create_student(&self, request: &NewStudent) -> Result<RemoteStudentId, ClientError> {
        (**self).create_student(request)
    }

    fn enroll_student(&self, request: &EnrollmentRequest) -> Result<(), ClientError> {
        (**self).enroll_student(request)
    }

    fn transfer_student(&self, request: &TransferRequest) -> Result<(), ClientError> {
        (**self).transfer_student(request)
    }
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "studentIdentifier")]
    pub external_id: ExternalId,
    pub school_id: SchoolId,
    pub school_year_id: SchoolYearId,
    pub grade_id: GradeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRequest {
    /// Carried in the URL, not the body.
    #[serde(skip)]
    pub remote_student_id: RemoteStudentId,
    pub school_id: SchoolId,
    pub school_year_id: SchoolYearId,
    pub grade_id: GradeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<ClassId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub from_school_id: SchoolId,
    pub to_school_id: SchoolId,
    pub remote_student_id: RemoteStudentId,
    pub grade_id: GradeId,
}

/// One downloaded export, as the platform names it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub kind: String,
    pub filename: String,
    pub data: String,
}
