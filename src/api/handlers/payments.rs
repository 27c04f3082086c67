//! Student payment ledger, admin-only on both the write and read side.

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{AppState, TokenQuery};
use crate::domain::Role;
use crate::service::RecordPayment;

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: String,
    pub token: Option<String>,
}

impl MonthQuery {
    fn token_query(&self) -> TokenQuery {
        TokenQuery {
            token: self.token.clone(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/payments",
    request_body = RecordPayment,
    responses(
        (status = 200, description = "Payment recorded"),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer" = [])),
    tag = "payments"
)]
pub async fn add_payment(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
    payload: Option<Json<RecordPayment>>,
) -> Response {
    if let Err(err) = super::authorize(&state, &headers, &query, &[Role::Admin]) {
        return err.into_response();
    }
    let Some(Json(payment)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match state.payments.add(payment).await {
        Ok(id) => (
            StatusCode::OK,
            Json(json!({
                "message": "Payment added successfully",
                "payment_id": id
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/payments",
    params(("month" = String, Query, description = "Month key, YYYY-MM")),
    responses(
        (status = 200, description = "Payments recorded in the month"),
        (status = 400, description = "Invalid month format"),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearer" = [])),
    tag = "payments"
)]
pub async fn payments_by_month(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<MonthQuery>,
) -> Response {
    if let Err(err) = super::authorize(&state, &headers, &query.token_query(), &[Role::Admin]) {
        return err.into_response();
    }

    match state.payments.in_month(&query.month).await {
        Ok(payments) => (
            StatusCode::OK,
            Json(json!({
                "message": "Payments retrieved successfully",
                "month": query.month,
                "payments": payments
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
