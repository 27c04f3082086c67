//! Daily report: today's bookings and today's scheduled lessons exported as
//! in-memory CSV attachments and mailed to the office.
//!
//! The scheduler is a sequential sleep-run loop, so a run can never overlap
//! the next one. Failures are logged and the loop continues; nothing on the
//! request path depends on this task.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info};

use crate::clock::Clock;
use crate::domain::Booking;
use crate::email::{Attachment, EmailSender};
use crate::store::BookingStore;

const CSV_HEADERS: [&str; 12] = [
    "parent_name",
    "phone",
    "subject",
    "age_level",
    "lesson_date",
    "lesson_time",
    "hours",
    "notes",
    "lesson_type",
    "students",
    "status",
    "booking_date",
];

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render bookings as CSV with a fixed header row; the student list is
/// joined with `"; "` into one column.
#[must_use]
pub fn bookings_to_csv(bookings: &[Booking]) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(&CSV_HEADERS.join(","));
    out.push('\n');
    for booking in bookings {
        let row = [
            booking.parent_name.clone().unwrap_or_default(),
            booking.phone.clone(),
            booking.subject.clone(),
            booking.age_level.clone(),
            booking.lesson_date.clone(),
            booking.lesson_time.clone(),
            booking.hours.to_string(),
            booking.notes.clone().unwrap_or_default(),
            match booking.lesson_type {
                crate::domain::LessonKind::Individual => "individual".to_string(),
                crate::domain::LessonKind::Group => "group".to_string(),
            },
            booking.students.join("; "),
            booking.status.as_str().to_string(),
            booking.booking_date.clone(),
        ];
        let line: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out.into_bytes()
}

/// Build and send one report for the clock's current date.
pub async fn run_report(
    bookings: &dyn BookingStore,
    mailer: &dyn EmailSender,
    clock: &dyn Clock,
    report_to: &str,
) -> Result<()> {
    let today = clock.now().date_naive().to_string();

    let created_today = bookings
        .list_by_booking_date(&today)
        .await
        .context("failed to load today's bookings")?;
    let scheduled_today = bookings
        .list_by_lesson_date(&today)
        .await
        .context("failed to load today's lessons")?;

    let attachments = [
        Attachment {
            filename: format!("bookings_{today}.csv"),
            bytes: bookings_to_csv(&created_today),
        },
        Attachment {
            filename: format!("lessons_{today}.csv"),
            bytes: bookings_to_csv(&scheduled_today),
        },
    ];

    mailer
        .send_with_attachments(
            &format!("Daily Report {today}"),
            "Attached are today's bookings (created today) and lessons (scheduled today).",
            report_to,
            &attachments,
        )
        .context("failed to send daily report")?;

    info!(
        date = %today,
        bookings = created_today.len(),
        lessons = scheduled_today.len(),
        "daily report sent"
    );
    Ok(())
}

/// Time until the next `report_hour:00` boundary.
#[must_use]
pub fn delay_until_next_run(now: DateTime<Utc>, report_hour: u32) -> Duration {
    let today_run = now
        .date_naive()
        .and_hms_opt(report_hour, 0, 0)
        .expect("valid report hour")
        .and_utc();
    if now < today_run {
        today_run - now
    } else {
        today_run + Duration::days(1) - now
    }
}

/// Spawn the recurring report task. Sequential by construction: the next
/// trigger is only computed after the previous run finishes.
pub fn spawn_report_scheduler(
    bookings: Arc<dyn BookingStore>,
    mailer: Arc<dyn EmailSender>,
    clock: Arc<dyn Clock>,
    report_to: String,
    report_hour: u32,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let delay = delay_until_next_run(clock.now(), report_hour);
            let delay = delay.to_std().unwrap_or_default();
            info!(seconds = delay.as_secs(), "next daily report scheduled");
            sleep(delay).await;

            // Failures are logged, not retried; the next day's run is a
            // fresh attempt.
            if let Err(err) =
                run_report(bookings.as_ref(), mailer.as_ref(), clock.as_ref(), &report_to).await
            {
                error!("daily report failed: {err:#}");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{bookings_to_csv, delay_until_next_run, run_report};
    use crate::clock::ManualClock;
    use crate::domain::{Booking, BookingStatus, LessonKind};
    use crate::email::RecordingEmailSender;
    use crate::store::{BookingStore, MemoryBookingStore};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn booking(lesson_date: &str, booking_date: &str) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            parent_name: Some("Umm Sami".to_string()),
            phone: "050-1234567".to_string(),
            subject: "Math, advanced".to_string(),
            age_level: "secondary".to_string(),
            lesson_date: lesson_date.to_string(),
            lesson_time: "16:00".to_string(),
            hours: 2.0,
            notes: None,
            lesson_type: LessonKind::Group,
            students: vec!["Sami".to_string(), "Dana".to_string()],
            status: BookingStatus::Pending,
            booking_date: booking_date.to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn csv_has_headers_joined_students_and_quoting() {
        let csv = String::from_utf8(bookings_to_csv(&[booking("2025-06-01", "2025-06-01")]))
            .unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("parent_name,phone,"));
        let row = lines.next().unwrap();
        assert!(row.contains("Sami; Dana"));
        // Comma in the subject forces quoting.
        assert!(row.contains("\"Math, advanced\""));
    }

    #[test]
    fn delay_rolls_to_tomorrow_after_the_hour() {
        let before = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        assert_eq!(delay_until_next_run(before, 10).num_hours(), 2);
        let after = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(delay_until_next_run(after, 10).num_hours(), 22);
    }

    #[tokio::test]
    async fn report_attaches_both_csvs_for_today() {
        let store = MemoryBookingStore::new();
        // Created today, scheduled later.
        store
            .insert(booking("2025-06-10", "2025-06-01"))
            .await
            .unwrap();
        // Scheduled today, created earlier.
        store
            .insert(booking("2025-06-01", "2025-05-28"))
            .await
            .unwrap();
        let mailer = RecordingEmailSender::new();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());

        run_report(&store, &mailer, &clock, "office@maram.example")
            .await
            .unwrap();

        let email = mailer.last().unwrap();
        assert_eq!(email.subject, "Daily Report 2025-06-01");
        assert_eq!(email.to, "office@maram.example");
        assert_eq!(email.attachments.len(), 2);
        assert_eq!(email.attachments[0].filename, "bookings_2025-06-01.csv");
        assert_eq!(email.attachments[1].filename, "lessons_2025-06-01.csv");

        let bookings_csv = String::from_utf8(email.attachments[0].bytes.clone()).unwrap();
        assert_eq!(bookings_csv.lines().count(), 2);
    }
}
