//! Core services: account lifecycle, lesson approval, bookings, payments.

pub mod account;
pub mod bookings;
pub mod lessons;
pub mod payments;

pub use account::AccountService;
pub use bookings::{BookingService, CreateBooking};
pub use payments::{PaymentService, RecordPayment};
pub use lessons::{
    DashboardOverview, LessonService, LessonSubmission, StudentMonthStats, TeacherMonthStats,
};
