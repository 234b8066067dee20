//! Notification Dispatcher: rejection notices for non-shortlisted candidates.
//!
//! Delivery goes through a pluggable `RejectionNotifier`. A failed send is reported
//! as `NotifyOutcome::Failed` and never aborts the run.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SmtpConfig;
use crate::triage::models::{NotifyOutcome, TriageOutcome, TriagedCandidate};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address: {0}")]
    Address(String),

    #[error("could not build message: {0}")]
    Message(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

/// A single outbound rejection notice.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// The external delivery channel. Returns success/failure only.
#[async_trait]
pub trait RejectionNotifier: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError>;
}

/// Sends one rejection notice if the candidate was rejected and has an address.
pub async fn notify(
    notifier: &dyn RejectionNotifier,
    candidate: &TriagedCandidate,
    job_title: Option<&str>,
) -> NotifyOutcome {
    let TriageOutcome::Rejected { rejection_reason } = &candidate.outcome else {
        return NotifyOutcome::Skipped {
            reason: "candidate is shortlisted".to_string(),
        };
    };

    let Some(to) = candidate.candidate.candidate_email.as_deref() else {
        debug!(
            "Resume #{}: no email address, rejection notice skipped",
            candidate.candidate.source_index
        );
        return NotifyOutcome::Skipped {
            reason: "no-address".to_string(),
        };
    };

    let email = build_rejection_email(
        to,
        candidate.candidate.name.as_deref(),
        job_title,
        rejection_reason,
    );

    match notifier.send(&email).await {
        Ok(()) => NotifyOutcome::Sent,
        Err(e) => {
            warn!(
                "Resume #{}: rejection notice to {to} failed: {e}",
                candidate.candidate.source_index
            );
            NotifyOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// Builds the notice text for a rejected candidate.
pub fn build_rejection_email(
    to: &str,
    name: Option<&str>,
    job_title: Option<&str>,
    rejection_reason: &str,
) -> OutboundEmail {
    let subject = match job_title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => format!("Update on your application for {title}"),
        None => "Update on your application".to_string(),
    };
    let greeting = match name {
        Some(name) => format!("Dear {name},"),
        None => "Dear candidate,".to_string(),
    };
    let body = format!(
        "{greeting}\n\n\
        Thank you for taking the time to apply.\n\n\
        {rejection_reason}\n\n\
        We appreciate your interest and wish you the best in your search.\n"
    );

    OutboundEmail {
        to: to.to_string(),
        subject,
        body,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Channels
// ────────────────────────────────────────────────────────────────────────────

/// Logs the notice instead of sending it. Default when SMTP is not configured.
pub struct LogNotifier;

#[async_trait]
impl RejectionNotifier for LogNotifier {
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError> {
        info!(
            to = %email.to,
            subject = %email.subject,
            "Rejection notice (log only): {}",
            email.body
        );
        Ok(())
    }
}

/// Plain-text rejection notices over an SMTP relay.
///
/// Sends run on the async transport, so dropping a send (dispatch or run
/// timeout) closes the connection instead of letting delivery finish later.
pub struct SmtpNotifier {
    config: SmtpConfig,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Result<Self, NotifyError> {
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .credentials(Credentials::new(config.user.clone(), config.pass.clone()))
            .build();
        Ok(Self::with_transport(config, mailer))
    }

    fn with_transport(config: SmtpConfig, mailer: AsyncSmtpTransport<Tokio1Executor>) -> Self {
        Self { config, mailer }
    }

    fn build_message(&self, email: &OutboundEmail) -> Result<Message, NotifyError> {
        let from = format!("{} <{}>", self.config.service_name, self.config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| NotifyError::Address(format!("from: {e}")))?;
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| NotifyError::Address(format!("{}: {e}", email.to)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

#[async_trait]
impl RejectionNotifier for SmtpNotifier {
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError> {
        let message = self.build_message(email)?;
        self.mailer
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::models::ScoredCandidate;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<OutboundEmail>>,
        fail: bool,
    }

    #[async_trait]
    impl RejectionNotifier for RecordingNotifier {
        async fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(email.clone());
            if self.fail {
                Err(NotifyError::Transport("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn candidate(email: Option<&str>, outcome: TriageOutcome) -> TriagedCandidate {
        TriagedCandidate {
            candidate: ScoredCandidate {
                source_index: 3,
                name: Some("Sam Lee".to_string()),
                match_score: Some(35.0),
                top_skills: vec![],
                highlights: String::new(),
                weak_points: "No Rust".to_string(),
                suggestions: String::new(),
                interview_questions: vec![],
                model_answers: vec![],
                candidate_email: email.map(str::to_string),
            },
            rank: 4,
            outcome,
        }
    }

    fn rejected() -> TriageOutcome {
        TriageOutcome::Rejected {
            rejection_reason: "Score 35. Gaps: No Rust".to_string(),
        }
    }

    #[tokio::test]
    async fn test_rejected_with_address_is_sent() {
        let notifier = RecordingNotifier::default();
        let outcome = notify(
            &notifier,
            &candidate(Some("sam@example.com"), rejected()),
            Some("Backend Engineer"),
        )
        .await;
        assert_eq!(outcome, NotifyOutcome::Sent);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "sam@example.com");
        assert_eq!(sent[0].subject, "Update on your application for Backend Engineer");
        assert!(sent[0].body.starts_with("Dear Sam Lee,"));
        assert!(sent[0].body.contains("Score 35. Gaps: No Rust"));
    }

    #[tokio::test]
    async fn test_missing_address_is_skipped_without_send() {
        let notifier = RecordingNotifier::default();
        let outcome = notify(&notifier, &candidate(None, rejected()), None).await;
        assert_eq!(
            outcome,
            NotifyOutcome::Skipped {
                reason: "no-address".to_string()
            }
        );
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_channel_failure_is_reported() {
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };
        let outcome = notify(&notifier, &candidate(Some("sam@example.com"), rejected()), None).await;
        assert!(matches!(outcome, NotifyOutcome::Failed { ref reason } if reason.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_shortlisted_candidate_is_never_notified() {
        let notifier = RecordingNotifier::default();
        let outcome = notify(
            &notifier,
            &candidate(
                Some("sam@example.com"),
                TriageOutcome::Shortlisted {
                    salary_suggestion: None,
                },
            ),
            None,
        )
        .await;
        assert!(matches!(outcome, NotifyOutcome::Skipped { .. }));
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let email = build_rejection_email("a@example.com", None, None, "reason");
        assert!(LogNotifier.send(&email).await.is_ok());
    }

    #[test]
    fn test_generic_greeting_and_subject() {
        let email = build_rejection_email("a@example.com", None, Some("  "), "reason");
        assert_eq!(email.subject, "Update on your application");
        assert!(email.body.starts_with("Dear candidate,"));
    }

    fn smtp_config() -> SmtpConfig {
        SmtpConfig {
            server: "smtp.invalid".to_string(),
            user: "user".to_string(),
            pass: "pass".to_string(),
            from_email: "noreply@example.com".to_string(),
            service_name: "ResumeRank AI".to_string(),
        }
    }

    #[tokio::test]
    async fn test_smtp_rejects_malformed_recipient_before_connecting() {
        let notifier = SmtpNotifier::new(smtp_config()).unwrap();
        let email = build_rejection_email("not-an-address", None, None, "reason");
        let err = notifier.send(&email).await.unwrap_err();
        assert!(matches!(err, NotifyError::Address(_)));
    }

    #[tokio::test]
    async fn test_timed_out_smtp_send_closes_its_connection() {
        use std::time::Duration;
        use tokio::io::AsyncReadExt;

        // A relay that accepts the connection but never sends its greeting.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous("127.0.0.1")
            .port(port)
            .build();
        let notifier = SmtpNotifier::with_transport(smtp_config(), mailer);
        let email = build_rejection_email("sam@example.com", None, None, "reason");

        let (accepted, sent) = tokio::join!(
            listener.accept(),
            tokio::time::timeout(Duration::from_millis(200), notifier.send(&email))
        );
        assert!(sent.is_err(), "send should still be waiting on the relay");

        let (mut socket, _) = accepted.unwrap();
        let mut received = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(5), socket.read_to_end(&mut received))
            .await
            .expect("abandoned send should close the connection");
        assert_eq!(read.unwrap(), 0);
    }
}
