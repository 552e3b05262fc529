//! Domain types shared by the roster, the remote directory, and the sync engine.
//!
//! All remote-facing structs deserialize from the platform's camelCase JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::external_id::ExternalId;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<i64> for $name {
            fn from(n: i64) -> Self {
                Self(n)
            }
        }
    };
}

integer_id!(
    /// The remote platform's own identifier for a student.
    RemoteStudentId
);
integer_id!(
    /// Remote identifier of a school.
    SchoolId
);
integer_id!(
    /// Remote identifier of an academic year.
    SchoolYearId
);
integer_id!(GradeId);
integer_id!(ClassId);

// ---------------------------------------------------------------------------
// Local (SIS) side
// ---------------------------------------------------------------------------

/// One student from the authoritative SIS roster. Immutable for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalStudentRecord {
    #[serde(rename = "studentIdentifier")]
    pub external_id: ExternalId,
    pub first_name: String,
    pub last_name: String,
    pub school_name: String,
    pub grade_id: GradeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<ClassId>,
    /// Target year of the run, stamped by the roster loader.
    pub school_year_id: SchoolYearId,
}

impl LocalStudentRecord {
    /// `First Last` for log lines and notices.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ---------------------------------------------------------------------------
// Remote side
// ---------------------------------------------------------------------------

/// One (student, school, year) association on file with the remote platform.
///
/// `external_id` is `None` when the platform holds no usable identifier for
/// the student (missing, `null`, or blank). Such rows cannot be joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEnrollment {
    #[serde(rename = "studentId")]
    pub remote_student_id: RemoteStudentId,
    #[serde(
        rename = "studentIdentifier",
        default,
        deserialize_with = "crate::external_id::deserialize_lenient"
    )]
    pub external_id: Option<ExternalId>,
    pub school_id: SchoolId,
    pub school_year_id: SchoolYearId,
}

/// A school in the district. Names are unique within a district and year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub id: SchoolId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_year_id: Option<SchoolYearId>,
}

/// An academic year as named by the remote platform (e.g. `2024-2025`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicYear {
    pub id: SchoolYearId,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Joined view
// ---------------------------------------------------------------------------

/// A roster student joined with its remote identity and resolved school.
///
/// `remote_student_id` is `None` when the remote has never seen the student;
/// `school_id` is `None` when the roster's school name matched no school.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRecord {
    pub student: LocalStudentRecord,
    pub remote_student_id: Option<RemoteStudentId>,
    pub school_id: Option<SchoolId>,
}

impl MergedRecord {
    pub fn external_id(&self) -> &ExternalId {
        &self.student.external_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(SchoolId(12).to_string(), "12");
        assert_eq!(RemoteStudentId::from(900).to_string(), "900");
    }

    #[test]
    fn remote_enrollment_parses_platform_json() {
        let json = r#"{
            "studentId": 9001,
            "studentIdentifier": "55",
            "schoolId": 3,
            "schoolYearId": 2024,
            "firstName": "Ada"
        }"#;
        let enrollment: RemoteEnrollment = serde_json::from_str(json).expect("parse");
        assert_eq!(enrollment.remote_student_id, RemoteStudentId(9001));
        assert_eq!(enrollment.external_id, Some(ExternalId::Numeric(55)));
        assert_eq!(enrollment.school_id, SchoolId(3));
        assert_eq!(enrollment.school_year_id, SchoolYearId(2024));
    }

    #[test]
    fn enrollment_page_tolerates_rows_without_identifier() {
        let json = r#"[
            {"studentId": 1, "studentIdentifier": "55", "schoolId": 3, "schoolYearId": 2024},
            {"studentId": 2, "studentIdentifier": "", "schoolId": 3, "schoolYearId": 2024},
            {"studentId": 3, "studentIdentifier": null, "schoolId": 3, "schoolYearId": 2024},
            {"studentId": 4, "schoolId": 3, "schoolYearId": 2024}
        ]"#;
        let page: Vec<RemoteEnrollment> = serde_json::from_str(json).expect("parse");
        let ids: Vec<_> = page.iter().map(|e| e.external_id.clone()).collect();
        assert_eq!(ids, vec![Some(ExternalId::Numeric(55)), None, None, None]);
    }

    #[test]
    fn school_year_id_is_optional_on_schools() {
        let school: School = serde_json::from_str(r#"{"id": 4, "name": "Lincoln"}"#).unwrap();
        assert_eq!(school.school_year_id, None);
    }
}
