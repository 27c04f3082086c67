//! Admin surface: institute-wide lesson queues, the approve/reject
//! decision, and the monthly hour statistics.

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::{AppState, TokenQuery};
use crate::domain::Role;

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub month: String,
    pub token: Option<String>,
}

impl StatsQuery {
    fn token_query(&self) -> TokenQuery {
        TokenQuery {
            token: self.token.clone(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/admin/pending-lessons",
    responses(
        (status = 200, description = "All pending lessons"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn pending_lessons(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Response {
    if let Err(err) = super::authorize(&state, &headers, &query, &[Role::Admin]) {
        return err.into_response();
    }

    match state.lessons.list_pending(None).await {
        Ok(lessons) => (
            StatusCode::OK,
            Json(json!({
                "message": "Pending lessons retrieved successfully",
                "pending_lessons": lessons
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/admin/approved-lessons",
    responses(
        (status = 200, description = "All approved lessons"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn approved_lessons(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Response {
    if let Err(err) = super::authorize(&state, &headers, &query, &[Role::Admin]) {
        return err.into_response();
    }

    match state.lessons.list_approved(None).await {
        Ok(lessons) => (
            StatusCode::OK,
            Json(json!({
                "message": "Approved lessons retrieved successfully",
                "approved_lessons": lessons
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/admin/approve-lesson/{lesson_id}",
    params(("lesson_id" = Uuid, Path, description = "Lesson to approve")),
    responses(
        (status = 200, description = "Lesson approved"),
        (status = 404, description = "Lesson not found")
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn approve_lesson(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(lesson_id): Path<Uuid>,
    Query(query): Query<TokenQuery>,
) -> Response {
    if let Err(err) = super::authorize(&state, &headers, &query, &[Role::Admin]) {
        return err.into_response();
    }

    match state.lessons.approve(lesson_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Lesson approved successfully" })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Rejection removes the record outright; a rejected lesson is
/// indistinguishable from one never submitted.
#[utoipa::path(
    post,
    path = "/admin/reject-lesson/{lesson_id}",
    params(("lesson_id" = Uuid, Path, description = "Lesson to reject")),
    responses(
        (status = 200, description = "Lesson rejected and removed"),
        (status = 404, description = "Lesson not found")
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn reject_lesson(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(lesson_id): Path<Uuid>,
    Query(query): Query<TokenQuery>,
) -> Response {
    if let Err(err) = super::authorize(&state, &headers, &query, &[Role::Admin]) {
        return err.into_response();
    }

    match state.lessons.reject(lesson_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Lesson rejected successfully" })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/delete-lesson/{lesson_id}",
    params(("lesson_id" = Uuid, Path, description = "Lesson to delete")),
    responses(
        (status = 200, description = "Lesson deleted"),
        (status = 404, description = "Lesson not found")
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn delete_lesson(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(lesson_id): Path<Uuid>,
    Query(query): Query<TokenQuery>,
) -> Response {
    if let Err(err) = super::authorize(&state, &headers, &query, &[Role::Admin]) {
        return err.into_response();
    }

    match state.lessons.admin_delete(lesson_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Lesson deleted successfully" })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/admin/teacher-stats",
    params(("month" = String, Query, description = "Month key, YYYY-MM")),
    responses(
        (status = 200, description = "Per-teacher hour totals for the month"),
        (status = 400, description = "Invalid month format"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn teacher_stats(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<StatsQuery>,
) -> Response {
    if let Err(err) = super::authorize(&state, &headers, &query.token_query(), &[Role::Admin]) {
        return err.into_response();
    }

    match state.lessons.teacher_stats(&query.month).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({
                "message": "Teacher statistics retrieved successfully",
                "month": query.month,
                "stats": stats
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/admin/student-stats",
    params(("month" = String, Query, description = "Month key, YYYY-MM")),
    responses(
        (status = 200, description = "Per-student hour totals for the month"),
        (status = 400, description = "Invalid month format"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn student_stats(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<StatsQuery>,
) -> Response {
    if let Err(err) = super::authorize(&state, &headers, &query.token_query(), &[Role::Admin]) {
        return err.into_response();
    }

    match state.lessons.student_stats(&query.month).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({
                "message": "Student statistics retrieved successfully",
                "month": query.month,
                "stats": stats
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
