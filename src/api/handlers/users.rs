//! Account lifecycle endpoints: signup, email verification, signin, and
//! the password-reset pair.

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use utoipa::ToSchema;

use super::AppState;
use crate::domain::Role;

fn default_role() -> Role {
    Role::Teacher
}

#[derive(ToSchema, Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
    pub birthday: Option<NaiveDate>,
}

#[derive(ToSchema, Debug, Deserialize)]
pub struct SigninRequest {
    pub username: String,
    pub password: String,
}

#[derive(ToSchema, Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(ToSchema, Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(ToSchema, Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: String,
}

#[utoipa::path(
    post,
    path = "/user/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "User registered; verification email sent"),
        (status = 400, description = "Duplicate username/email or invalid payload")
    ),
    tag = "users"
)]
pub async fn signup(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<SignupRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match state
        .accounts
        .signup(
            &request.username,
            &request.email,
            &request.password,
            request.role,
            request.birthday,
        )
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "message": "User registered successfully. Please check your email to verify your account."
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/user/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Access token issued"),
        (status = 401, description = "Invalid username or password"),
        (status = 403, description = "Email not verified")
    ),
    tag = "users"
)]
pub async fn signin(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<SigninRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match state
        .accounts
        .signin(&request.username, &request.password)
        .await
    {
        Ok(token) => (
            StatusCode::OK,
            Json(json!({
                "message": "Signed in successfully",
                "access_token": token,
                "token_type": "bearer"
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/user/verify-email",
    params(("token" = String, Query, description = "Opaque verification token from the email link")),
    responses(
        (status = 200, description = "Email verified"),
        (status = 400, description = "Invalid or expired token")
    ),
    tag = "users"
)]
pub async fn verify_email(
    Extension(state): Extension<Arc<AppState>>,
    query: Option<Query<VerifyEmailQuery>>,
) -> Response {
    let Some(Query(query)) = query else {
        return (StatusCode::BAD_REQUEST, "Missing token".to_string()).into_response();
    };

    match state.accounts.verify_email(&query.token).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "message": "Email verified successfully! You can now log in."
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/user/resend-verification",
    request_body = ResendVerificationRequest,
    responses(
        (status = 200, description = "New verification email sent"),
        (status = 400, description = "User already verified"),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
pub async fn resend_verification(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<ResendVerificationRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match state.accounts.resend_verification(&request.email).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "message": "A new verification link has been sent to your email."
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/user/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset email sent"),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
pub async fn forgot_password(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match state.accounts.forgot_password(&request.email).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "message": "A password reset link has been sent to your email."
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/user/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset"),
        (status = 400, description = "Invalid or expired token"),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
pub async fn reset_password(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match state
        .accounts
        .reset_password(&request.token, &request.new_password)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Password reset successful" })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
