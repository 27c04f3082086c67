//! Route handlers, one module per surface.

pub mod admin;
pub mod bookings;
pub mod health;
pub mod payments;
pub mod teacher;
pub mod users;

use axum::http::HeaderMap;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::tokens::TokenService;
use crate::auth::{authenticate, require_role, Principal};
use crate::clock::Clock;
use crate::domain::Role;
use crate::error::ApiError;
use crate::service::{AccountService, BookingService, LessonService, PaymentService};
use crate::store::UserStore;

/// Shared handler state, wired once at startup and injected via
/// `Extension`.
pub struct AppState {
    pub accounts: AccountService,
    pub lessons: LessonService,
    pub bookings: BookingService,
    pub payments: PaymentService,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<TokenService>,
    pub clock: Arc<dyn Clock>,
}

/// Legacy clients pass the bearer token as `?token=`; the header wins when
/// both are present.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// Decode the caller and check the required roles in one step. Token
/// failures surface as 401-class errors, role mismatches as 403.
pub(crate) fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    query: &TokenQuery,
    roles: &[Role],
) -> Result<Principal, ApiError> {
    let principal = authenticate(&state.tokens, headers, query.token.as_deref())?;
    require_role(&principal, roles)?;
    Ok(principal)
}
