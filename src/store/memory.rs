//! In-memory stores backing tests and DSN-less development runs.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use super::{BookingStore, LessonStore, PaymentStore, UserStore};
use crate::domain::{Booking, BookingStatus, Lesson, LessonPatch, Payment, User};

/// A panic while holding one of these locks leaves plain data behind, so a
/// poisoned guard is still usable.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = lock(&self.users);
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = lock(&self.users);
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn exists_username_or_email(&self, username: &str, email: &str) -> Result<bool> {
        let users = lock(&self.users);
        Ok(users
            .iter()
            .any(|u| u.username == username || u.email == email))
    }

    async fn find_by_verification_token(&self, token: &str) -> Result<Option<User>> {
        let users = lock(&self.users);
        Ok(users
            .iter()
            .find(|u| u.verification_token.as_deref() == Some(token))
            .cloned())
    }

    async fn insert(&self, user: User) -> Result<()> {
        lock(&self.users).push(user);
        Ok(())
    }

    async fn mark_verified(&self, username: &str) -> Result<bool> {
        let mut users = lock(&self.users);
        match users.iter_mut().find(|u| u.username == username) {
            Some(user) => {
                user.verified = true;
                user.verification_token = None;
                user.verification_expiry = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_verification(
        &self,
        email: &str,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<bool> {
        let mut users = lock(&self.users);
        match users.iter_mut().find(|u| u.email == email) {
            Some(user) => {
                user.verification_token = Some(token.to_string());
                user.verification_expiry = Some(expiry);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> Result<bool> {
        let mut users = lock(&self.users);
        match users.iter_mut().find(|u| u.email == email) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn with_birthday(&self, month_day: &str) -> Result<Vec<User>> {
        let users = lock(&self.users);
        Ok(users
            .iter()
            .filter(|u| {
                u.birthday
                    .is_some_and(|b| b.format("%m-%d").to_string() == month_day)
            })
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryLessonStore {
    lessons: Mutex<HashMap<Uuid, Lesson>>,
}

impl MemoryLessonStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LessonStore for MemoryLessonStore {
    async fn insert(&self, lesson: Lesson) -> Result<Uuid> {
        let id = lesson.id;
        lock(&self.lessons).insert(id, lesson);
        Ok(id)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Lesson>> {
        Ok(lock(&self.lessons).get(&id).cloned())
    }

    async fn update_pending_owned(
        &self,
        id: Uuid,
        owner: &str,
        patch: LessonPatch,
    ) -> Result<bool> {
        let mut lessons = lock(&self.lessons);
        match lessons.get_mut(&id) {
            Some(lesson) if lesson.teacher_name == owner && !lesson.approved => {
                lesson.apply(patch);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_pending_owned(&self, id: Uuid, owner: &str) -> Result<bool> {
        let mut lessons = lock(&self.lessons);
        let matches = lessons
            .get(&id)
            .is_some_and(|lesson| lesson.teacher_name == owner && !lesson.approved);
        if matches {
            lessons.remove(&id);
        }
        Ok(matches)
    }

    async fn set_approved(&self, id: Uuid) -> Result<bool> {
        let mut lessons = lock(&self.lessons);
        match lessons.get_mut(&id) {
            Some(lesson) => {
                lesson.approved = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(lock(&self.lessons).remove(&id).is_some())
    }

    async fn list(&self, owner: Option<&str>, approved: bool) -> Result<Vec<Lesson>> {
        let lessons = lock(&self.lessons);
        let mut out: Vec<Lesson> = lessons
            .values()
            .filter(|l| l.approved == approved)
            .filter(|l| owner.is_none_or(|o| l.teacher_name == o))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.date.as_text().cmp(&b.date.as_text()));
        Ok(out)
    }

    async fn list_approved_in_month(&self, month: &str) -> Result<Vec<Lesson>> {
        let lessons = lock(&self.lessons);
        Ok(lessons
            .values()
            .filter(|l| l.approved && l.date.in_month(month))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryPaymentStore {
    payments: Mutex<Vec<Payment>>,
}

impl MemoryPaymentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn insert(&self, payment: Payment) -> Result<Uuid> {
        let id = payment.id;
        lock(&self.payments).push(payment);
        Ok(id)
    }

    async fn list_in_month(&self, month: &str) -> Result<Vec<Payment>> {
        let payments = lock(&self.payments);
        let mut out: Vec<Payment> = payments
            .iter()
            .filter(|p| p.date.starts_with(month))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(out)
    }
}

#[derive(Debug, Default)]
pub struct MemoryBookingStore {
    bookings: Mutex<HashMap<Uuid, Booking>>,
}

impl MemoryBookingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut bookings: Vec<Booking>) -> Vec<Booking> {
        bookings.sort_by(|a, b| {
            (a.lesson_date.as_str(), a.lesson_time.as_str())
                .cmp(&(b.lesson_date.as_str(), b.lesson_time.as_str()))
        });
        bookings
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn insert(&self, booking: Booking) -> Result<Uuid> {
        let id = booking.id;
        lock(&self.bookings).insert(id, booking);
        Ok(id)
    }

    async fn update_status(&self, id: Uuid, status: BookingStatus) -> Result<Option<Booking>> {
        let mut bookings = lock(&self.bookings);
        match bookings.get_mut(&id) {
            Some(booking) => {
                booking.status = status;
                Ok(Some(booking.clone()))
            }
            None => Ok(None),
        }
    }

    async fn list_by_booking_date(&self, date: &str) -> Result<Vec<Booking>> {
        let bookings = lock(&self.bookings);
        Ok(Self::sorted(
            bookings
                .values()
                .filter(|b| b.booking_date == date)
                .cloned()
                .collect(),
        ))
    }

    async fn list_by_lesson_date(&self, date: &str) -> Result<Vec<Booking>> {
        let bookings = lock(&self.bookings);
        Ok(Self::sorted(
            bookings
                .values()
                .filter(|b| b.lesson_date == date)
                .cloned()
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryLessonStore, MemoryUserStore};
    use crate::domain::{Lesson, LessonDate, LessonKind, LessonPatch, Role, User};
    use crate::store::{LessonStore, UserStore};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn lesson(teacher: &str, approved: bool) -> Lesson {
        Lesson {
            id: Uuid::new_v4(),
            teacher_name: teacher.to_string(),
            kind: LessonKind::Individual,
            students: vec!["Sami".to_string()],
            date: LessonDate::Text("2025-03-10".to_string()),
            hours: 1.5,
            subject: "Math".to_string(),
            education_level: "secondary".to_string(),
            approved,
        }
    }

    #[tokio::test]
    async fn conditional_update_rejects_wrong_owner_and_approved() {
        let store = MemoryLessonStore::new();
        let pending = lesson("amal", false);
        let approved = lesson("amal", true);
        let pending_id = store.insert(pending).await.unwrap();
        let approved_id = store.insert(approved).await.unwrap();

        let patch = LessonPatch {
            hours: Some(2.0),
            ..LessonPatch::default()
        };
        assert!(store
            .update_pending_owned(pending_id, "amal", patch.clone())
            .await
            .unwrap());
        assert!(!store
            .update_pending_owned(pending_id, "badr", patch.clone())
            .await
            .unwrap());
        assert!(!store
            .update_pending_owned(approved_id, "amal", patch)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn mark_verified_clears_token_fields() {
        let store = MemoryUserStore::new();
        store
            .insert(User {
                username: "amal".to_string(),
                email: "amal@example.com".to_string(),
                password_hash: "digest".to_string(),
                role: Role::Teacher,
                birthday: None,
                verified: false,
                verification_token: Some("tok".to_string()),
                verification_expiry: Some(
                    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                ),
            })
            .await
            .unwrap();

        assert!(store.mark_verified("amal").await.unwrap());
        let user = store.find_by_username("amal").await.unwrap().unwrap();
        assert!(user.verified);
        assert!(user.verification_token.is_none());
        assert!(user.verification_expiry.is_none());
    }

    #[tokio::test]
    async fn store_survives_a_poisoned_lock() {
        let store = std::sync::Arc::new(MemoryLessonStore::new());
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lessons.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let id = store.insert(lesson("amal", false)).await.unwrap();
        assert!(store.find(id).await.unwrap().is_some());
    }
}
