//! Operator notices.
//!
//! Notices are best-effort: a failing notifier is logged and otherwise
//! ignored so it never hides the error being reported.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use fpsync_core::config::NotifySettings;

use crate::reconcile::{Action, RecordFailure};

pub const SYNC_SUBJECT: &str = "FPODMS Student Sync";
pub const EXTRACT_SUBJECT: &str = "FPODMS Extract Error";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook {url} failed: {message}")]
    Webhook { url: String, message: String },
}

pub trait Notifier {
    fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Writes notices to the log at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        tracing::error!("{subject}\n{body}");
        Ok(())
    }
}

/// POSTs `{"subject": .., "body": ..}` to a fixed URL.
pub struct WebhookNotifier {
    agent: ureq::Agent,
    url: String,
}

#[derive(Serialize)]
struct Notice<'a> {
    subject: &'a str,
    body: &'a str,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        Self {
            agent,
            url: url.into(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.agent
            .post(&self.url)
            .send_json(Notice { subject, body })
            .map(|_| ())
            .map_err(|e| NotifyError::Webhook {
                url: self.url.clone(),
                message: e.to_string(),
            })
    }
}

/// Webhook notifier when a URL is configured, log-only otherwise.
pub fn from_settings(settings: &NotifySettings) -> Box<dyn Notifier> {
    match settings.webhook_url.as_deref() {
        Some(url) if !url.is_empty() => Box::new(WebhookNotifier::new(url)),
        _ => Box::new(TracingNotifier),
    }
}

pub fn notify_best_effort(notifier: &dyn Notifier, subject: &str, body: &str) {
    if let Err(err) = notifier.notify(subject, body) {
        tracing::warn!("could not deliver notice '{subject}': {err}");
    }
}

/// `FPODMS Student Sync: CREATE <id>` for failed creates, `UPDATE <id>`
/// for every other per-record failure.
pub fn record_subject(failure: &RecordFailure) -> String {
    let verb = match failure.attempted {
        Some(Action::Create { .. }) => "CREATE",
        _ => "UPDATE",
    };
    format!("{SYNC_SUBJECT}: {verb} {}", failure.external_id)
}

pub fn record_body(failure: &RecordFailure) -> String {
    let action = failure
        .attempted
        .as_ref()
        .map_or("none", Action::label);
    format!(
        "student: {}\nstudentIdentifier: {}\naction: {action}\nerror: {}",
        failure.name, failure.external_id, failure.message
    )
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::sync::mpsc;
    use std::thread;

    use fpsync_core::{ExternalId, SchoolId};

    use super::*;
    use crate::reconcile::FailureKind;

    fn failure(attempted: Option<Action>) -> RecordFailure {
        RecordFailure {
            external_id: ExternalId::Numeric(55),
            name: "Ada Lovelace".into(),
            attempted,
            kind: FailureKind::Validation,
            message: "rejected".into(),
        }
    }

    #[test]
    fn create_failures_use_create_subject() {
        let f = failure(Some(Action::Create {
            school_id: SchoolId(1),
        }));
        assert_eq!(record_subject(&f), "FPODMS Student Sync: CREATE 55");
        assert!(record_body(&f).contains("action: CREATE"));
    }

    #[test]
    fn other_failures_use_update_subject() {
        assert_eq!(record_subject(&failure(None)), "FPODMS Student Sync: UPDATE 55");
        assert!(record_body(&failure(None)).contains("action: none"));
    }

    #[test]
    fn webhook_posts_subject_and_body() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Ok(mut request) = server.recv() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let _ = tx.send(body);
                let _ = request.respond(tiny_http::Response::empty(tiny_http::StatusCode(204)));
            }
        });

        let notifier = WebhookNotifier::new(format!("http://127.0.0.1:{port}/hook"));
        notifier.notify(SYNC_SUBJECT, "roster missing").unwrap();

        let body: serde_json::Value = serde_json::from_str(&rx.recv().unwrap()).unwrap();
        assert_eq!(body["subject"], "FPODMS Student Sync");
        assert_eq!(body["body"], "roster missing");
    }

    #[test]
    fn unreachable_webhook_is_swallowed() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let notifier = WebhookNotifier::new(format!("http://127.0.0.1:{port}/hook"));
        assert!(notifier.notify(SYNC_SUBJECT, "x").is_err());
        notify_best_effort(&notifier, SYNC_SUBJECT, "x");
    }

    #[test]
    fn settings_without_url_log_only() {
        let notifier = from_settings(&NotifySettings::default());
        assert!(notifier.notify(SYNC_SUBJECT, "x").is_ok());
    }
}
