//! Booking surface. Creation is public (prospective parents have no
//! account); the status transition and the daily listings are admin-only.

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{AppState, TokenQuery};
use crate::domain::{BookingStatus, Role};
use crate::error::ApiError;
use crate::service::CreateBooking;

/// Status arrives as a raw string so an unknown value can be answered with
/// "Invalid status" instead of a generic deserialization failure.
#[derive(ToSchema, Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
    pub token: Option<String>,
}

impl DateQuery {
    fn token_query(&self) -> TokenQuery {
        TokenQuery {
            token: self.token.clone(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/bookings",
    request_body = CreateBooking,
    responses(
        (status = 200, description = "Booking created"),
        (status = 400, description = "Invalid payload")
    ),
    tag = "bookings"
)]
pub async fn create_booking(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<CreateBooking>>,
) -> Response {
    let Some(Json(booking)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match state.bookings.create(booking).await {
        Ok(id) => (
            StatusCode::OK,
            Json(json!({
                "message": "Booking created successfully",
                "booking_id": id
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    patch,
    path = "/bookings/{booking_id}/status",
    params(("booking_id" = Uuid, Path, description = "Booking to update")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Invalid status"),
        (status = 404, description = "Booking not found")
    ),
    security(("bearer" = [])),
    tag = "bookings"
)]
pub async fn update_booking_status(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<Uuid>,
    Query(query): Query<TokenQuery>,
    payload: Option<Json<UpdateStatusRequest>>,
) -> Response {
    if let Err(err) = super::authorize(&state, &headers, &query, &[Role::Admin]) {
        return err.into_response();
    }
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let Ok(status) = request.status.parse::<BookingStatus>() else {
        return ApiError::Validation("Invalid status".to_string()).into_response();
    };

    match state.bookings.update_status(booking_id, status).await {
        Ok(booking) => (
            StatusCode::OK,
            Json(json!({ "message": "Status updated", "booking": booking })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Bookings created on the given date (default today).
#[utoipa::path(
    get,
    path = "/bookings/today/bookings",
    params(("date" = Option<String>, Query, description = "YYYY-MM-DD, omit for today")),
    responses(
        (status = 200, description = "Bookings created on the date"),
        (status = 400, description = "Invalid date format")
    ),
    security(("bearer" = [])),
    tag = "bookings"
)]
pub async fn bookings_by_date(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<DateQuery>,
) -> Response {
    if let Err(err) = super::authorize(&state, &headers, &query.token_query(), &[Role::Admin]) {
        return err.into_response();
    }

    match state.bookings.bookings_on(query.date.as_deref()).await {
        Ok(bookings) => (StatusCode::OK, Json(bookings)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Bookings whose lesson is scheduled on the given date (default today).
#[utoipa::path(
    get,
    path = "/bookings/today/lessons",
    params(("date" = Option<String>, Query, description = "YYYY-MM-DD, omit for today")),
    responses(
        (status = 200, description = "Bookings with a lesson on the date"),
        (status = 400, description = "Invalid date format")
    ),
    security(("bearer" = [])),
    tag = "bookings"
)]
pub async fn lessons_by_date(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<DateQuery>,
) -> Response {
    if let Err(err) = super::authorize(&state, &headers, &query.token_query(), &[Role::Admin]) {
        return err.into_response();
    }

    match state.bookings.lessons_on(query.date.as_deref()).await {
        Ok(bookings) => (StatusCode::OK, Json(bookings)).into_response(),
        Err(err) => err.into_response(),
    }
}
