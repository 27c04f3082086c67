//! # Maram (Tutoring Institute Backend)
//!
//! Role-based backend for a tutoring institute. Three concerns share one
//! service:
//!
//! - **Accounts**: signup with email verification (opaque token, 2 hour
//!   expiry), JWT sign-in, and a password-reset flow signed with a secret
//!   distinct from the access-token secret.
//! - **Lessons**: teachers submit individual or group lessons that start
//!   pending; admins approve (flag flip) or reject (destructive delete).
//!   Edits and deletes by the owning teacher are only possible while the
//!   lesson is pending. Monthly statistics aggregate approved hours per
//!   teacher and per student.
//! - **Bookings**: public intake of scheduling requests with their own
//!   status set, exported daily as CSV attachments on a fixed-hour email
//!   report.
//!
//! Admins additionally keep a student payment ledger, recorded and listed
//! by month.
//!
//! Roles are flat (`admin`, `teacher`, `student`); ownership unauthorized
//! and not-found are deliberately conflated to `404` so callers cannot
//! probe for other teachers' lessons.

pub mod api;
pub mod auth;
pub mod cli;
pub mod clock;
pub mod config;
pub mod domain;
pub mod email;
pub mod error;
pub mod report;
pub mod service;
pub mod store;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
