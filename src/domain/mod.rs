//! Data records shared by stores, services, and handlers.

pub mod booking;
pub mod lesson;
pub mod payment;
pub mod user;

pub use booking::{Booking, BookingStatus};
pub use lesson::{Lesson, LessonDate, LessonKind, LessonPatch};
pub use payment::Payment;
pub use user::{Role, User};
