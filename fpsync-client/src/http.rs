//! Blocking HTTP implementation of the directory client.
//!
//! ## Endpoints (relative to the configured base URL)
//!
//! ```text
//! POST /api/auth/login                          -> {"token": "..."}
//! GET  /api/years                               -> [AcademicYear]
//! GET  /api/district/schools?schoolYearId=      -> [School]
//! GET  /api/schools/{id}/students?schoolYearId= -> [RemoteEnrollment]
//! POST /api/students                            -> {"studentId": n}
//! POST /api/students/{id}/enrollments
//! POST /api/schools/{from}/students/move
//! GET  /api/schools/{id}/classes?schoolYearId=  -> [object]
//! GET  /api/exports/{kind}?schoolYearId=        -> file body
//! ```
//!
//! Every request after login carries `Authorization: Bearer <token>`.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use fpsync_core::config::RemoteConfig;
use fpsync_core::{AcademicYear, RemoteEnrollment, RemoteStudentId, School, SchoolId, SchoolYearId};

use crate::api::{
    DirectoryClient, EnrollmentRequest, ExportClient, ExportFile, NewStudent, TransferRequest,
};
use crate::error::ClientError;

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedStudent {
    student_id: RemoteStudentId,
}

/// Authenticated session against the platform.
pub struct HttpClient {
    agent: ureq::Agent,
    base_url: String,
    token: String,
}

impl HttpClient {
    /// Build an agent and log in with the configured credentials.
    pub fn connect(config: &RemoteConfig) -> Result<Self, ClientError> {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        let base_url = config.base_url.trim_end_matches('/').to_string();

        let response = agent
            .post(&format!("{base_url}/api/auth/login"))
            .send_json(LoginRequest {
                email: &config.email,
                password: &config.password,
            })
            .map_err(|err| match err {
                ureq::Error::Status(401 | 403, response) => ClientError::Auth {
                    email: config.email.clone(),
                    message: body_of(response),
                },
                other => classify("login", other),
            })?;
        let login: LoginResponse = response.into_json().map_err(|source| ClientError::Decode {
            operation: "login",
            source,
        })?;

        tracing::info!("logged in to {base_url} as {}", config.email);
        Ok(Self {
            agent,
            base_url,
            token: login.token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn get(
        &self,
        operation: &'static str,
        path: &str,
        year: SchoolYearId,
    ) -> Result<ureq::Response, ClientError> {
        tracing::debug!("GET {path} (schoolYearId={year})");
        self.agent
            .get(&self.url(path))
            .set("Authorization", &self.authorization())
            .query("schoolYearId", &year.to_string())
            .call()
            .map_err(|err| classify(operation, err))
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        year: SchoolYearId,
    ) -> Result<T, ClientError> {
        self.get(operation, path, year)?
            .into_json()
            .map_err(|source| ClientError::Decode { operation, source })
    }

    fn post(&self, path: &str, body: impl Serialize) -> Result<ureq::Response, ureq::Error> {
        tracing::debug!("POST {path}");
        self.agent
            .post(&self.url(path))
            .set("Authorization", &self.authorization())
            .send_json(body)
    }
}

impl DirectoryClient for HttpClient {
    fn list_years(&self) -> Result<Vec<AcademicYear>, ClientError> {
        tracing::debug!("GET /api/years");
        self.agent
            .get(&self.url("/api/years"))
            .set("Authorization", &self.authorization())
            .call()
            .map_err(|err| classify("list years", err))?
            .into_json()
            .map_err(|source| ClientError::Decode {
                operation: "list years",
                source,
            })
    }

    fn list_schools(&self, year: SchoolYearId) -> Result<Vec<School>, ClientError> {
        self.get_json("list schools", "/api/district/schools", year)
    }

    fn list_enrollments(
        &self,
        school: SchoolId,
        year: SchoolYearId,
    ) -> Result<Vec<RemoteEnrollment>, ClientError> {
        self.get_json(
            "list enrollments",
            &format!("/api/schools/{school}/students"),
            year,
        )
    }

    fn create_student(&self, request: &NewStudent) -> Result<RemoteStudentId, ClientError> {
        let response = self
            .post("/api/students", request)
            .map_err(|err| match err {
                ureq::Error::Status(409, response) => ClientError::DuplicateStudent {
                    external_id: request.external_id.to_string(),
                    message: body_of(response),
                },
                ureq::Error::Status(400 | 422, response) => ClientError::Validation {
                    message: body_of(response),
                },
                other => classify("create student", other),
            })?;
        let created: CreatedStudent =
            response.into_json().map_err(|source| ClientError::Decode {
                operation: "create student",
                source,
            })?;
        Ok(created.student_id)
    }

    fn enroll_student(&self, request: &EnrollmentRequest) -> Result<(), ClientError> {
        let path = format!("/api/students/{}/enrollments", request.remote_student_id);
        self.post(&path, request).map_err(|err| match err {
            ureq::Error::Status(409, response) => ClientError::EnrollmentConflict {
                remote_student_id: request.remote_student_id,
                message: body_of(response),
            },
            ureq::Error::Status(400 | 422, response) => ClientError::Validation {
                message: body_of(response),
            },
            other => classify("enroll student", other),
        })?;
        Ok(())
    }

    fn transfer_student(&self, request: &TransferRequest) -> Result<(), ClientError> {
        let path = format!("/api/schools/{}/students/move", request.from_school_id);
        let body = json!({
            "toSchoolId": request.to_school_id,
            "students": [{
                "studentId": request.remote_student_id,
                "gradeId": request.grade_id,
            }],
        });
        self.post(&path, body).map_err(|err| {
            let message = match err {
                ureq::Error::Status(status, response) => {
                    format!("HTTP {status}: {}", body_of(response))
                }
                ureq::Error::Transport(transport) => transport.to_string(),
            };
            ClientError::Transfer {
                remote_student_id: request.remote_student_id,
                from: request.from_school_id,
                to: request.to_school_id,
                message,
            }
        })?;
        Ok(())
    }
}

impl ExportClient for HttpClient {
    fn list_classes(
        &self,
        school: SchoolId,
        year: SchoolYearId,
    ) -> Result<Vec<Map<String, Value>>, ClientError> {
        self.get_json("list classes", &format!("/api/schools/{school}/classes"), year)
    }

    fn fetch_export(&self, kind: &str, year: SchoolYearId) -> Result<ExportFile, ClientError> {
        let response = self.get("fetch export", &format!("/api/exports/{kind}"), year)?;
        let filename = response
            .header("Content-Disposition")
            .and_then(disposition_filename)
            .unwrap_or_else(|| format!("{kind}_{year}.csv"));
        let data = response
            .into_string()
            .map_err(|source| ClientError::Decode {
                operation: "fetch export",
                source,
            })?;
        Ok(ExportFile {
            kind: kind.to_string(),
            filename,
            data,
        })
    }
}

fn classify(operation: &'static str, err: ureq::Error) -> ClientError {
    match err {
        ureq::Error::Status(status, response) => ClientError::Status {
            operation,
            status,
            body: body_of(response),
        },
        ureq::Error::Transport(transport) => ClientError::Transport {
            operation,
            message: transport.to_string(),
        },
    }
}

fn body_of(response: ureq::Response) -> String {
    response.into_string().unwrap_or_default()
}

/// `attachment; filename="bas_2024.csv"` -> `bas_2024.csv`.
///
/// Directory components are stripped so the name is safe to join onto a
/// local path.
fn disposition_filename(header: &str) -> Option<String> {
    let value = header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?;
    let name = value.trim_matches('"');
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_filename_variants() {
        assert_eq!(
            disposition_filename(r#"attachment; filename="bas_2024.csv""#),
            Some("bas_2024.csv".to_string())
        );
        assert_eq!(
            disposition_filename("attachment; filename=lli.csv"),
            Some("lli.csv".to_string())
        );
        assert_eq!(
            disposition_filename(r#"attachment; filename="../../etc/passwd""#),
            Some("passwd".to_string())
        );
        assert_eq!(disposition_filename("inline"), None);
        assert_eq!(disposition_filename(r#"attachment; filename="""#), None);
    }
}
