//! Booking record: a scheduling request with its own lifecycle, distinct
//! from lesson approval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::lesson::LessonKind;

#[derive(ToSchema, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Completed,
    Cancelled,
}

impl BookingStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub parent_name: Option<String>,
    pub phone: String,
    pub subject: String,
    pub age_level: String,
    /// Scheduled lesson date, `YYYY-MM-DD`.
    pub lesson_date: String,
    /// Scheduled lesson time, `HH:MM` 24h.
    pub lesson_time: String,
    pub hours: f64,
    pub notes: Option<String>,
    pub lesson_type: LessonKind,
    pub students: Vec<String>,
    pub status: BookingStatus,
    /// Date the booking was created, `YYYY-MM-DD`; defaults to `created_at`.
    pub booking_date: String,
    pub created_at: DateTime<Utc>,
}
