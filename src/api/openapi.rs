use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::handlers::{admin, bookings, health, payments, teacher, users};
use crate::domain::{BookingStatus, LessonKind, Payment, Role};
use crate::service::{
    CreateBooking, DashboardOverview, LessonSubmission, RecordPayment, StudentMonthStats,
    TeacherMonthStats,
};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Add new endpoints here so they show up in the served document.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        users::signup,
        users::signin,
        users::verify_email,
        users::resend_verification,
        users::forgot_password,
        users::reset_password,
        teacher::submit_lesson,
        teacher::pending_lessons,
        teacher::approved_lessons,
        teacher::update_lesson,
        teacher::delete_lesson,
        teacher::dashboard_overview,
        teacher::teachers_birthdays,
        admin::pending_lessons,
        admin::approved_lessons,
        admin::approve_lesson,
        admin::reject_lesson,
        admin::delete_lesson,
        admin::teacher_stats,
        admin::student_stats,
        payments::add_payment,
        payments::payments_by_month,
        bookings::create_booking,
        bookings::update_booking_status,
        bookings::bookings_by_date,
        bookings::lessons_by_date,
    ),
    components(schemas(
        Role,
        LessonKind,
        BookingStatus,
        LessonSubmission,
        CreateBooking,
        TeacherMonthStats,
        StudentMonthStats,
        DashboardOverview,
        Payment,
        RecordPayment,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "users", description = "Account lifecycle and password reset"),
        (name = "teacher", description = "Lesson submission and owner-scoped management"),
        (name = "admin", description = "Approval queue and monthly statistics"),
        (name = "payments", description = "Student payment ledger"),
        (name = "bookings", description = "Public booking intake and daily listings"),
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
