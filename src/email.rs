//! Email delivery abstraction.
//!
//! Transport is out of scope for the core: callers hand a subject, body,
//! and recipient (plus named byte attachments for the daily report) to an
//! `EmailSender` and move on. Delivery failures are the sender's problem to
//! report; the flows that enqueue mail treat it as fire-and-forget and only
//! log errors.

use anyhow::Result;
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Named byte payload attached to a report email.
#[derive(Clone, Debug)]
pub struct Attachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub trait EmailSender: Send + Sync {
    fn send(&self, subject: &str, body: &str, to: &str) -> Result<()>;

    fn send_with_attachments(
        &self,
        subject: &str,
        body: &str,
        to: &str,
        attachments: &[Attachment],
    ) -> Result<()>;
}

/// Local dev sender that logs instead of delivering.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, subject: &str, body: &str, to: &str) -> Result<()> {
        info!(to, subject, body_len = body.len(), "email send stub");
        Ok(())
    }

    fn send_with_attachments(
        &self,
        subject: &str,
        body: &str,
        to: &str,
        attachments: &[Attachment],
    ) -> Result<()> {
        let names: Vec<&str> = attachments
            .iter()
            .map(|a| a.filename.as_str())
            .collect();
        info!(
            to,
            subject,
            body_len = body.len(),
            attachments = ?names,
            "email send stub (with attachments)"
        );
        Ok(())
    }
}

/// Captures outbound mail so tests can assert on it.
#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    pub sent: Mutex<Vec<RecordedEmail>>,
}

#[derive(Clone, Debug)]
pub struct RecordedEmail {
    pub subject: String,
    pub body: String,
    pub to: String,
    pub attachments: Vec<Attachment>,
}

impl RecordingEmailSender {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last(&self) -> Option<RecordedEmail> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }
}

impl EmailSender for RecordingEmailSender {
    fn send(&self, subject: &str, body: &str, to: &str) -> Result<()> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(RecordedEmail {
            subject: subject.to_string(),
            body: body.to_string(),
            to: to.to_string(),
            attachments: Vec::new(),
        });
        Ok(())
    }

    fn send_with_attachments(
        &self,
        subject: &str,
        body: &str,
        to: &str,
        attachments: &[Attachment],
    ) -> Result<()> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(RecordedEmail {
            subject: subject.to_string(),
            body: body.to_string(),
            to: to.to_string(),
            attachments: attachments.to_vec(),
        });
        Ok(())
    }
}

/// Verification email sent at signup and on resend. The opaque token rides
/// in the link; the resend link covers the expired case.
#[must_use]
pub fn verification_email(base_url: &str, name: &str, email: &str, token: &str) -> (String, String) {
    let base = base_url.trim_end_matches('/');
    let verify_link = format!("{base}/verify-email?token={token}");
    let resend_link = format!("{base}/resend-verification?email={email}");
    let body = format!(
        "Dear {name},\n\n\
         Thank you for signing up! Please verify your email by visiting:\n\n\
         {verify_link}\n\n\
         If your link has expired, request a new one:\n\n\
         {resend_link}\n\n\
         If you did not sign up, please ignore this email.\n\n\
         Regards,\nMaram Institute"
    );
    ("Verify Your Account".to_string(), body)
}

/// Password reset email carrying the signed reset token.
#[must_use]
pub fn reset_email(base_url: &str, name: &str, token: &str) -> (String, String) {
    let base = base_url.trim_end_matches('/');
    let body = format!(
        "Dear {name},\n\n\
         We received a request to reset your password. Visit:\n\n\
         {base}/reset-password?token={token}\n\n\
         If you did not request this, please ignore the email.\n\n\
         Regards,\nMaram Institute"
    );
    ("Password Reset Request".to_string(), body)
}
