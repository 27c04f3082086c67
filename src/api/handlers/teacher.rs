//! Teacher surface: lesson submission plus owner-scoped listing, editing
//! and deletion. Every mutation here only touches pending lessons the
//! caller owns; approval moves a lesson out of reach.

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
use crate::domain::{LessonPatch, Role};
use crate::service::LessonSubmission;

#[derive(Debug, Deserialize)]
pub struct OverviewQuery {
    pub month: Option<String>,
    pub token: Option<String>,
}

impl OverviewQuery {
    fn token_query(&self) -> TokenQuery {
        TokenQuery {
            token: self.token.clone(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/teacher/submit",
    request_body = LessonSubmission,
    responses(
        (status = 200, description = "Lesson submitted, pending approval"),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Caller is not a teacher")
    ),
    security(("bearer" = [])),
    tag = "teacher"
)]
pub async fn submit_lesson(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
    payload: Option<Json<LessonSubmission>>,
) -> Response {
    let principal = match super::authorize(&state, &headers, &query, &[Role::Teacher]) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };
    let Some(Json(submission)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match state.lessons.submit(&principal.username, submission).await {
        Ok(id) => (
            StatusCode::OK,
            Json(json!({
                "message": "Lesson submitted successfully, pending approval",
                "lesson_id": id
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/teacher/pending-lessons",
    responses(
        (status = 200, description = "Caller's pending lessons"),
        (status = 403, description = "Caller is not a teacher")
    ),
    security(("bearer" = [])),
    tag = "teacher"
)]
pub async fn pending_lessons(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Response {
    let principal = match super::authorize(&state, &headers, &query, &[Role::Teacher]) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    match state.lessons.list_pending(Some(&principal.username)).await {
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
    path = "/teacher/approved-lessons",
    responses(
        (status = 200, description = "Caller's approved lessons"),
        (status = 403, description = "Caller is not a teacher")
    ),
    security(("bearer" = [])),
    tag = "teacher"
)]
pub async fn approved_lessons(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Response {
    let principal = match super::authorize(&state, &headers, &query, &[Role::Teacher]) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    match state.lessons.list_approved(Some(&principal.username)).await {
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
    put,
    path = "/teacher/update-lesson/{lesson_id}",
    params(("lesson_id" = Uuid, Path, description = "Lesson to update")),
    request_body = LessonPatch,
    responses(
        (status = 200, description = "Lesson updated"),
        (status = 404, description = "Lesson not found or not authorized")
    ),
    security(("bearer" = [])),
    tag = "teacher"
)]
pub async fn update_lesson(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(lesson_id): Path<Uuid>,
    Query(query): Query<TokenQuery>,
    payload: Option<Json<LessonPatch>>,
) -> Response {
    let principal = match super::authorize(&state, &headers, &query, &[Role::Teacher]) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };
    let Some(Json(patch)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match state
        .lessons
        .edit(&principal.username, lesson_id, patch)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Lesson updated successfully" })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/teacher/delete-lesson/{lesson_id}",
    params(("lesson_id" = Uuid, Path, description = "Lesson to delete")),
    responses(
        (status = 200, description = "Lesson deleted"),
        (status = 404, description = "Lesson not found or not authorized")
    ),
    security(("bearer" = [])),
    tag = "teacher"
)]
pub async fn delete_lesson(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(lesson_id): Path<Uuid>,
    Query(query): Query<TokenQuery>,
) -> Response {
    let principal = match super::authorize(&state, &headers, &query, &[Role::Teacher]) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    match state.lessons.delete(&principal.username, lesson_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Lesson deleted successfully" })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// The caller's own approved totals, optionally narrowed to one month.
#[utoipa::path(
    get,
    path = "/teacher/dashboard-overview",
    params(("month" = Option<String>, Query, description = "Month key, YYYY-MM")),
    responses(
        (status = 200, description = "Caller's approved lesson totals"),
        (status = 400, description = "Invalid month format"),
        (status = 403, description = "Caller is not a teacher")
    ),
    security(("bearer" = [])),
    tag = "teacher"
)]
pub async fn dashboard_overview(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<OverviewQuery>,
) -> Response {
    let principal =
        match super::authorize(&state, &headers, &query.token_query(), &[Role::Teacher]) {
            Ok(principal) => principal,
            Err(err) => return err.into_response(),
        };

    match state
        .lessons
        .dashboard_overview(&principal.username, query.month.as_deref())
        .await
    {
        Ok(overview) => (
            StatusCode::OK,
            Json(json!({
                "message": "Dashboard overview data retrieved successfully",
                "total_lessons": overview.total_lessons,
                "total_hours": overview.total_hours,
                "individual_hours_by_level": overview.individual_hours_by_level,
                "group_hours_by_level": overview.group_hours_by_level
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Teachers whose birthday (month and day) falls on the clock's today.
#[utoipa::path(
    get,
    path = "/teacher/teachers-birthdays",
    responses((status = 200, description = "Teachers with a birthday today")),
    tag = "teacher"
)]
pub async fn teachers_birthdays(Extension(state): Extension<Arc<AppState>>) -> Response {
    let today = state.clock.now().format("%m-%d").to_string();

    match state.users.with_birthday(&today).await {
        Ok(users) => {
            let birthdays: Vec<_> = users
                .iter()
                .map(|user| json!({ "name": user.username, "birthday": today }))
                .collect();
            (
                StatusCode::OK,
                Json(json!({
                    "message": "Today's teachers' birthdays retrieved successfully",
                    "birthdays": birthdays
                })),
            )
                .into_response()
        }
        Err(err) => crate::error::ApiError::from(err).into_response(),
    }
}
