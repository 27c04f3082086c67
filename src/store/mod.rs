//! Narrow store interfaces the services depend on.
//!
//! Compound invariants like "lesson must be pending and owned to edit" are
//! enforced by single conditional update/delete methods whose predicate
//! carries owner + status, so check-and-mutate is atomic at the store and
//! needs no application-side locking.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Booking, BookingStatus, Lesson, LessonPatch, Payment, User};

pub mod memory;
pub mod postgres;

pub use memory::{MemoryBookingStore, MemoryLessonStore, MemoryPaymentStore, MemoryUserStore};
pub use postgres::{
    ensure_schema, PgBookingStore, PgLessonStore, PgPaymentStore, PgUserStore,
};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Duplicate-identity probe over both unique keys at once.
    async fn exists_username_or_email(&self, username: &str, email: &str) -> Result<bool>;
    async fn find_by_verification_token(&self, token: &str) -> Result<Option<User>>;
    async fn insert(&self, user: User) -> Result<()>;
    /// Set `verified = true` and clear both verification fields in one step.
    async fn mark_verified(&self, username: &str) -> Result<bool>;
    /// Overwrite the verification token + expiry, invalidating the old pair.
    async fn set_verification(
        &self,
        email: &str,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<bool>;
    async fn update_password(&self, email: &str, password_hash: &str) -> Result<bool>;
    /// Users whose birthday (month + day, `MM-DD`) matches, for the
    /// birthdays view.
    async fn with_birthday(&self, month_day: &str) -> Result<Vec<User>>;
}

#[async_trait]
pub trait LessonStore: Send + Sync {
    async fn insert(&self, lesson: Lesson) -> Result<Uuid>;
    async fn find(&self, id: Uuid) -> Result<Option<Lesson>>;
    /// Apply a patch only when id, owner, and `approved = false` all match.
    async fn update_pending_owned(
        &self,
        id: Uuid,
        owner: &str,
        patch: LessonPatch,
    ) -> Result<bool>;
    /// Delete only when id, owner, and `approved = false` all match.
    async fn delete_pending_owned(&self, id: Uuid, owner: &str) -> Result<bool>;
    async fn set_approved(&self, id: Uuid) -> Result<bool>;
    /// Unconditional delete (admin reject / admin delete).
    async fn delete(&self, id: Uuid) -> Result<bool>;
    async fn list(&self, owner: Option<&str>, approved: bool) -> Result<Vec<Lesson>>;
    /// Approved lessons whose date falls in `YYYY-MM`, matching both the
    /// timestamp and the string-prefix date forms.
    async fn list_approved_in_month(&self, month: &str) -> Result<Vec<Lesson>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, payment: Payment) -> Result<Uuid>;
    /// Payments whose `YYYY-MM-DD` date falls in the `YYYY-MM` month.
    async fn list_in_month(&self, month: &str) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert(&self, booking: Booking) -> Result<Uuid>;
    async fn update_status(&self, id: Uuid, status: BookingStatus) -> Result<Option<Booking>>;
    /// Bookings created on the given `YYYY-MM-DD` date.
    async fn list_by_booking_date(&self, date: &str) -> Result<Vec<Booking>>;
    /// Bookings whose lesson is scheduled on the given date.
    async fn list_by_lesson_date(&self, date: &str) -> Result<Vec<Booking>>;
}
