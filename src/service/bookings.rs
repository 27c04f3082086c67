//! Booking lifecycle: scheduling requests with their own status set,
//! separate from lesson approval.

use chrono::{NaiveDate, NaiveTime};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{Booking, BookingStatus, LessonKind};
use crate::error::ApiError;
use crate::store::BookingStore;

fn default_lesson_type() -> LessonKind {
    LessonKind::Individual
}

fn default_status() -> BookingStatus {
    BookingStatus::Pending
}

/// Public booking payload. `lesson_type` and `status` default when absent
/// so sparse clients still produce a sane record.
#[derive(ToSchema, Clone, Debug, serde::Deserialize)]
pub struct CreateBooking {
    pub parent_name: Option<String>,
    pub phone: String,
    pub subject: String,
    pub age_level: String,
    pub lesson_date: String,
    pub lesson_time: String,
    pub hours: f64,
    pub notes: Option<String>,
    #[serde(default = "default_lesson_type")]
    pub lesson_type: LessonKind,
    pub students: Vec<String>,
    #[serde(default = "default_status")]
    pub status: BookingStatus,
}

pub struct BookingService {
    bookings: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
}

fn validate_date(date: &str) -> Result<(), ApiError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| ApiError::Validation("Invalid date format. Use YYYY-MM-DD.".to_string()))
}

impl BookingService {
    pub fn new(bookings: Arc<dyn BookingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { bookings, clock }
    }

    pub async fn create(&self, payload: CreateBooking) -> Result<Uuid, ApiError> {
        validate_date(&payload.lesson_date)?;
        NaiveTime::parse_from_str(&payload.lesson_time, "%H:%M")
            .map_err(|_| ApiError::Validation("Invalid time format. Use HH:MM.".to_string()))?;
        if payload.hours <= 0.0 {
            return Err(ApiError::Validation("Hours must be positive".to_string()));
        }

        let students: Vec<String> = payload
            .students
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        payload
            .lesson_type
            .check_students(&students)
            .map_err(ApiError::Validation)?;

        let created_at = self.clock.now();
        let booking = Booking {
            id: Uuid::new_v4(),
            parent_name: payload.parent_name,
            phone: payload.phone,
            subject: payload.subject,
            age_level: payload.age_level,
            lesson_date: payload.lesson_date,
            lesson_time: payload.lesson_time,
            hours: payload.hours,
            notes: payload.notes,
            lesson_type: payload.lesson_type,
            students,
            status: payload.status,
            booking_date: created_at.date_naive().to_string(),
            created_at,
        };
        Ok(self.bookings.insert(booking).await?)
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, ApiError> {
        self.bookings
            .update_status(id, status)
            .await?
            .ok_or(ApiError::NotFound("Booking"))
    }

    /// Bookings created on `date` (default today).
    pub async fn bookings_on(&self, date: Option<&str>) -> Result<Vec<Booking>, ApiError> {
        let date = self.coerce_date(date)?;
        Ok(self.bookings.list_by_booking_date(&date).await?)
    }

    /// Bookings whose lesson is scheduled on `date` (default today).
    pub async fn lessons_on(&self, date: Option<&str>) -> Result<Vec<Booking>, ApiError> {
        let date = self.coerce_date(date)?;
        Ok(self.bookings.list_by_lesson_date(&date).await?)
    }

    fn coerce_date(&self, date: Option<&str>) -> Result<String, ApiError> {
        match date {
            Some(date) if !date.is_empty() => {
                validate_date(date)?;
                Ok(date.to_string())
            }
            _ => Ok(self.clock.now().date_naive().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BookingService, CreateBooking};
    use crate::clock::ManualClock;
    use crate::domain::{BookingStatus, LessonKind};
    use crate::error::ApiError;
    use crate::store::MemoryBookingStore;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use uuid::Uuid;

    fn service() -> BookingService {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
        BookingService::new(Arc::new(MemoryBookingStore::new()), Arc::new(clock))
    }

    fn payload(kind: LessonKind, students: &[&str]) -> CreateBooking {
        CreateBooking {
            parent_name: Some("Umm Sami".to_string()),
            phone: "050-1234567".to_string(),
            subject: "Physics".to_string(),
            age_level: "secondary".to_string(),
            lesson_date: "2025-06-10".to_string(),
            lesson_time: "16:30".to_string(),
            hours: 1.5,
            notes: None,
            lesson_type: kind,
            students: students.iter().map(|s| (*s).to_string()).collect(),
            status: BookingStatus::Pending,
        }
    }

    #[tokio::test]
    async fn booking_date_defaults_to_today() {
        let service = service();
        service
            .create(payload(LessonKind::Individual, &["Sami"]))
            .await
            .unwrap();
        let today = service.bookings_on(None).await.unwrap();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].booking_date, "2025-06-01");
    }

    #[tokio::test]
    async fn group_booking_cardinality_is_enforced() {
        let service = service();
        assert!(matches!(
            service.create(payload(LessonKind::Group, &["Sami"])).await,
            Err(ApiError::Validation(_))
        ));
        assert!(service
            .create(payload(LessonKind::Group, &["Sami", "Dana"]))
            .await
            .is_ok());
        assert!(matches!(
            service
                .create(payload(LessonKind::Individual, &["Sami", "Dana"]))
                .await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn bad_dates_and_times_are_rejected() {
        let service = service();
        let mut bad_date = payload(LessonKind::Individual, &["Sami"]);
        bad_date.lesson_date = "10/06/2025".to_string();
        assert!(matches!(
            service.create(bad_date).await,
            Err(ApiError::Validation(_))
        ));

        let mut bad_time = payload(LessonKind::Individual, &["Sami"]);
        bad_time.lesson_time = "4pm".to_string();
        assert!(matches!(
            service.create(bad_time).await,
            Err(ApiError::Validation(_))
        ));

        assert!(matches!(
            service.bookings_on(Some("June 1st")).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn status_updates_hit_existing_bookings_only() {
        let service = service();
        let id = service
            .create(payload(LessonKind::Individual, &["Sami"]))
            .await
            .unwrap();
        let updated = service
            .update_status(id, BookingStatus::Approved)
            .await
            .unwrap();
        assert_eq!(updated.status, BookingStatus::Approved);

        assert!(matches!(
            service
                .update_status(Uuid::new_v4(), BookingStatus::Cancelled)
                .await,
            Err(ApiError::NotFound("Booking"))
        ));
    }

    #[tokio::test]
    async fn lessons_on_filters_by_scheduled_date() {
        let service = service();
        service
            .create(payload(LessonKind::Individual, &["Sami"]))
            .await
            .unwrap();
        assert_eq!(
            service.lessons_on(Some("2025-06-10")).await.unwrap().len(),
            1
        );
        assert!(service
            .lessons_on(Some("2025-06-11"))
            .await
            .unwrap()
            .is_empty());
    }
}
