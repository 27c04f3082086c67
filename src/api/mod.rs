//! Router wiring and server bootstrap.

pub mod handlers;
mod openapi;

pub use openapi::openapi;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{delete, get, patch, post, put},
    Extension, Json, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

use crate::{
    auth::tokens::TokenService,
    clock::{Clock, SystemClock},
    config::AppConfig,
    email::{EmailSender, LogEmailSender},
    report::spawn_report_scheduler,
    service::{AccountService, BookingService, LessonService, PaymentService},
    store::{
        ensure_schema, BookingStore, LessonStore, MemoryBookingStore, MemoryLessonStore,
        MemoryPaymentStore, MemoryUserStore, PaymentStore, PgBookingStore, PgLessonStore,
        PgPaymentStore, PgUserStore, UserStore,
    },
};
use handlers::{admin, bookings, health, payments, teacher, users, AppState};

/// Build the application router around the shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/openapi.json", get(serve_openapi))
        .route("/user/signup", post(users::signup))
        .route("/user/signin", post(users::signin))
        .route("/user/verify-email", get(users::verify_email))
        .route("/user/resend-verification", post(users::resend_verification))
        .route("/user/forgot-password", post(users::forgot_password))
        .route("/user/reset-password", post(users::reset_password))
        .route("/teacher/submit", post(teacher::submit_lesson))
        .route("/teacher/pending-lessons", get(teacher::pending_lessons))
        .route("/teacher/approved-lessons", get(teacher::approved_lessons))
        .route("/teacher/update-lesson/:lesson_id", put(teacher::update_lesson))
        .route("/teacher/delete-lesson/:lesson_id", delete(teacher::delete_lesson))
        .route("/teacher/dashboard-overview", get(teacher::dashboard_overview))
        .route("/teacher/teachers-birthdays", get(teacher::teachers_birthdays))
        .route("/admin/pending-lessons", get(admin::pending_lessons))
        .route("/admin/approved-lessons", get(admin::approved_lessons))
        .route("/admin/approve-lesson/:lesson_id", post(admin::approve_lesson))
        .route("/admin/reject-lesson/:lesson_id", post(admin::reject_lesson))
        .route("/admin/delete-lesson/:lesson_id", delete(admin::delete_lesson))
        .route("/admin/teacher-stats", get(admin::teacher_stats))
        .route("/admin/student-stats", get(admin::student_stats))
        .route(
            "/payments",
            post(payments::add_payment).get(payments::payments_by_month),
        )
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/:booking_id/status", patch(bookings::update_booking_status))
        .route("/bookings/today/bookings", get(bookings::bookings_by_date))
        .route("/bookings/today/lessons", get(bookings::lessons_by_date))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state)),
        )
}

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: Option<String>, config: AppConfig) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mailer: Arc<dyn EmailSender> = Arc::new(LogEmailSender);

    let (users, lessons, payments, bookings): (
        Arc<dyn UserStore>,
        Arc<dyn LessonStore>,
        Arc<dyn PaymentStore>,
        Arc<dyn BookingStore>,
    ) = match dsn {
        Some(dsn) => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(&dsn)
                .await
                .context("Failed to connect to database")?;

            ensure_schema(&pool).await?;

            (
                Arc::new(PgUserStore::new(pool.clone())),
                Arc::new(PgLessonStore::new(pool.clone())),
                Arc::new(PgPaymentStore::new(pool.clone())),
                Arc::new(PgBookingStore::new(pool)),
            )
        }
        None => {
            info!("No DSN configured, using in-memory stores");
            (
                Arc::new(MemoryUserStore::new()),
                Arc::new(MemoryLessonStore::new()),
                Arc::new(MemoryPaymentStore::new()),
                Arc::new(MemoryBookingStore::new()),
            )
        }
    };

    let tokens = Arc::new(TokenService::new(
        &config.access_secret,
        &config.reset_secret,
        config.access_ttl_minutes,
        config.reset_ttl_minutes,
        clock.clone(),
    ));

    let state = Arc::new(AppState {
        accounts: AccountService::new(
            users.clone(),
            tokens.clone(),
            mailer.clone(),
            clock.clone(),
            config.verification_expire_hours,
            config.base_url.clone(),
        ),
        lessons: LessonService::new(lessons),
        bookings: BookingService::new(bookings.clone(), clock.clone()),
        payments: PaymentService::new(payments),
        users,
        tokens,
        clock: clock.clone(),
    });

    spawn_report_scheduler(
        bookings,
        mailer,
        clock,
        config.report_to.clone(),
        config.report_hour,
    );

    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
