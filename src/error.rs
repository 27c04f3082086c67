//! Error taxonomy shared by services and handlers.
//!
//! Validation and authorization failures are reported at the boundary with
//! their own status codes. Store failures are logged and collapsed into a
//! generic 500 so the backing-store details never leak to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("User with this email or username already exists")]
    DuplicateIdentity,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Email not verified. Please verify your email before logging in.")]
    EmailNotVerified,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Verification link has expired. Request a new one.")]
    VerificationExpired,
    #[error("Invalid token format")]
    MalformedToken,
    #[error("Not authenticated")]
    MissingToken,
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("User not found")]
    UserNotFound,
    #[error("User is already verified")]
    AlreadyVerified,
    // Existence and ownership are deliberately conflated so a teacher cannot
    // probe for another teacher's lesson ids.
    #[error("Lesson not found or not authorized")]
    NotFoundOrUnauthorized,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Access denied")]
    AuthorizationDenied,
    #[error("{0}")]
    Validation(String),
    #[error("Internal server error")]
    Store(#[source] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::DuplicateIdentity
            | Self::InvalidToken
            | Self::VerificationExpired
            | Self::InvalidOrExpiredToken
            | Self::AlreadyVerified
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::InvalidCredentials | Self::MalformedToken | Self::MissingToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::EmailNotVerified | Self::AuthorizationDenied => StatusCode::FORBIDDEN,
            Self::UserNotFound | Self::NotFoundOrUnauthorized | Self::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Store(ref cause) = self {
            // Log the underlying cause; the caller only sees a generic 500.
            error!("store failure: {cause:#}");
        }
        let body = json!({ "detail": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
