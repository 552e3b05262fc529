//! SIS roster loader.
//!
//! The roster is a records-oriented export: a JSON array (or, for `.yaml` /
//! `.yml` files, a YAML sequence) of objects keyed by
//! `studentIdentifier`, `firstName`, `lastName`, `schoolName`, `gradeId` and
//! an optional `classId`. Rows are validated field by field so every failure
//! names the offending row.

use std::collections::HashMap;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::RosterError;
use crate::external_id::ExternalId;
use crate::types::{ClassId, GradeId, LocalStudentRecord, SchoolYearId};

const STUDENT_IDENTIFIER: &str = "studentIdentifier";
const FIRST_NAME: &str = "firstName";
const LAST_NAME: &str = "lastName";
const SCHOOL_NAME: &str = "schoolName";
const GRADE_ID: &str = "gradeId";
const CLASS_ID: &str = "classId";

/// Load and validate the roster at `path`, stamping `school_year_id` on
/// every record.
pub fn load_at(path: &Path, school_year_id: SchoolYearId) -> Result<Vec<LocalStudentRecord>, RosterError> {
    let contents = std::fs::read_to_string(path).map_err(|source| RosterError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let rows: Vec<Value> = if is_yaml(path) {
        serde_yaml::from_str(&contents).map_err(|source| RosterError::Yaml {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        serde_json::from_str(&contents).map_err(|source| RosterError::Json {
            path: path.to_path_buf(),
            source,
        })?
    };

    let records = parse_rows(&rows, school_year_id)?;
    tracing::info!("loaded {} roster records from {}", records.len(), path.display());
    Ok(records)
}

/// Validate already-decoded roster rows.
pub fn parse_rows(
    rows: &[Value],
    school_year_id: SchoolYearId,
) -> Result<Vec<LocalStudentRecord>, RosterError> {
    let mut seen: HashMap<ExternalId, usize> = HashMap::with_capacity(rows.len());
    let mut records = Vec::with_capacity(rows.len());

    for (row, value) in rows.iter().enumerate() {
        let Some(fields) = value.as_object() else {
            return Err(RosterError::InvalidField {
                row,
                field: "row",
                reason: "expected an object".to_string(),
            });
        };

        let record = LocalStudentRecord {
            external_id: external_id_field(fields, row)?,
            first_name: text_field(fields, row, FIRST_NAME)?,
            last_name: text_field(fields, row, LAST_NAME)?,
            school_name: text_field(fields, row, SCHOOL_NAME)?,
            grade_id: GradeId(integer_field(fields, row, GRADE_ID)?.ok_or(
                RosterError::MissingField {
                    row,
                    field: GRADE_ID,
                },
            )?),
            class_id: integer_field(fields, row, CLASS_ID)?.map(ClassId),
            school_year_id,
        };

        if let Some(first) = seen.insert(record.external_id.clone(), row) {
            return Err(RosterError::DuplicateExternalId {
                external_id: record.external_id.to_string(),
                first,
                second: row,
            });
        }
        records.push(record);
    }

    Ok(records)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}

fn external_id_field(fields: &Map<String, Value>, row: usize) -> Result<ExternalId, RosterError> {
    let missing = RosterError::MissingField {
        row,
        field: STUDENT_IDENTIFIER,
    };
    match fields.get(STUDENT_IDENTIFIER) {
        None | Some(Value::Null) => Err(missing),
        Some(Value::String(s)) => ExternalId::parse(s).ok_or(missing),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(ExternalId::Numeric(i))
            } else if let Some(u) = n.as_u64() {
                Ok(ExternalId::from_u64(u))
            } else {
                n.as_f64()
                    .map(ExternalId::from_f64)
                    .ok_or_else(|| invalid(row, STUDENT_IDENTIFIER, "unrepresentable number"))
            }
        }
        Some(other) => Err(invalid(
            row,
            STUDENT_IDENTIFIER,
            &format!("expected a string or number, found {}", kind_of(other)),
        )),
    }
}

fn text_field(
    fields: &Map<String, Value>,
    row: usize,
    field: &'static str,
) -> Result<String, RosterError> {
    match fields.get(field) {
        None | Some(Value::Null) => Err(RosterError::MissingField { row, field }),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(RosterError::MissingField { row, field })
        }
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(invalid(
            row,
            field,
            &format!("expected a string, found {}", kind_of(other)),
        )),
    }
}

/// Integer field; integral floats (`3.0`) and numeric strings are accepted.
fn integer_field(
    fields: &Map<String, Value>,
    row: usize,
    field: &'static str,
) -> Result<Option<i64>, RosterError> {
    let id = match fields.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => ExternalId::parse(s),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => Some(ExternalId::Numeric(i)),
            None => n.as_f64().map(ExternalId::from_f64),
        },
        Some(other) => {
            return Err(invalid(
                row,
                field,
                &format!("expected an integer, found {}", kind_of(other)),
            ))
        }
    };
    match id {
        Some(ExternalId::Numeric(n)) => Ok(Some(n)),
        _ => Err(invalid(row, field, "expected an integer")),
    }
}

fn invalid(row: usize, field: &'static str, reason: &str) -> RosterError {
    RosterError::InvalidField {
        row,
        field,
        reason: reason.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
