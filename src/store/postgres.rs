//! Postgres-backed stores.
//!
//! Queries are plain SQL with bind parameters, wrapped in `db.query` spans
//! so traces show the statement and operation. Conditional predicates
//! (owner + status) live in the SQL itself, keeping check-and-mutate atomic.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::{BookingStore, LessonStore, PaymentStore, UserStore};
use crate::domain::{
    Booking, BookingStatus, Lesson, LessonDate, LessonKind, LessonPatch, Payment, Role, User,
};

/// Create the tables on startup when they do not exist yet. Deployments
/// with managed migrations can skip this.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    let statements = [
        r"
        CREATE TABLE IF NOT EXISTS users (
            username TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL,
            birthday DATE,
            verified BOOLEAN NOT NULL DEFAULT FALSE,
            verification_token TEXT,
            verification_expiry TIMESTAMPTZ
        )
        ",
        r"
        CREATE TABLE IF NOT EXISTS lessons (
            id UUID PRIMARY KEY,
            teacher_name TEXT NOT NULL,
            kind TEXT NOT NULL,
            students TEXT[] NOT NULL,
            date TEXT NOT NULL,
            hours DOUBLE PRECISION NOT NULL,
            subject TEXT NOT NULL,
            education_level TEXT NOT NULL,
            approved BOOLEAN NOT NULL DEFAULT FALSE
        )
        ",
        r"
        CREATE TABLE IF NOT EXISTS student_payments (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            cost BIGINT NOT NULL,
            date TEXT NOT NULL
        )
        ",
        r"
        CREATE TABLE IF NOT EXISTS bookings (
            id UUID PRIMARY KEY,
            parent_name TEXT,
            phone TEXT NOT NULL,
            subject TEXT NOT NULL,
            age_level TEXT NOT NULL,
            lesson_date TEXT NOT NULL,
            lesson_time TEXT NOT NULL,
            hours DOUBLE PRECISION NOT NULL,
            notes TEXT,
            lesson_type TEXT NOT NULL,
            students TEXT[] NOT NULL,
            status TEXT NOT NULL,
            booking_date TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )
        ",
    ];
    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("failed to ensure schema")?;
    }
    Ok(())
}

fn parse_role(value: &str) -> Result<Role> {
    match value {
        "admin" => Ok(Role::Admin),
        "teacher" => Ok(Role::Teacher),
        "student" => Ok(Role::Student),
        other => Err(anyhow!("unknown role in store: {other}")),
    }
}

fn parse_kind(value: &str) -> Result<LessonKind> {
    match value {
        "individual" => Ok(LessonKind::Individual),
        "group" => Ok(LessonKind::Group),
        other => Err(anyhow!("unknown lesson kind in store: {other}")),
    }
}

fn parse_status(value: &str) -> Result<BookingStatus> {
    value
        .parse()
        .map_err(|()| anyhow!("unknown booking status in store: {value}"))
}

fn kind_str(kind: LessonKind) -> &'static str {
    match kind {
        LessonKind::Individual => "individual",
        LessonKind::Group => "group",
    }
}

/// Dates are stored in their submitted text form; re-parse the timestamp
/// variant when it looks like one so month filters and responses keep the
/// original shape.
fn parse_date(text: String) -> LessonDate {
    match DateTime::parse_from_rfc3339(&text) {
        Ok(ts) => LessonDate::Timestamp(ts.with_timezone(&Utc)),
        Err(_) => LessonDate::Text(text),
    }
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User> {
    let role: String = row.get("role");
    Ok(User {
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: parse_role(&role)?,
        birthday: row.get("birthday"),
        verified: row.get("verified"),
        verification_token: row.get("verification_token"),
        verification_expiry: row.get("verification_expiry"),
    })
}

fn lesson_from_row(row: &sqlx::postgres::PgRow) -> Result<Lesson> {
    let kind: String = row.get("kind");
    let date: String = row.get("date");
    Ok(Lesson {
        id: row.get("id"),
        teacher_name: row.get("teacher_name"),
        kind: parse_kind(&kind)?,
        students: row.get("students"),
        date: parse_date(date),
        hours: row.get("hours"),
        subject: row.get("subject"),
        education_level: row.get("education_level"),
        approved: row.get("approved"),
    })
}

fn booking_from_row(row: &sqlx::postgres::PgRow) -> Result<Booking> {
    let lesson_type: String = row.get("lesson_type");
    let status: String = row.get("status");
    Ok(Booking {
        id: row.get("id"),
        parent_name: row.get("parent_name"),
        phone: row.get("phone"),
        subject: row.get("subject"),
        age_level: row.get("age_level"),
        lesson_date: row.get("lesson_date"),
        lesson_time: row.get("lesson_time"),
        hours: row.get("hours"),
        notes: row.get("notes"),
        lesson_type: parse_kind(&lesson_type)?,
        students: row.get("students"),
        status: parse_status(&status)?,
        booking_date: row.get("booking_date"),
        created_at: row.get("created_at"),
    })
}

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let query = "SELECT * FROM users WHERE username = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by username")?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = "SELECT * FROM users WHERE email = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by email")?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn exists_username_or_email(&self, username: &str, email: &str) -> Result<bool> {
        let query = "SELECT 1 FROM users WHERE username = $1 OR email = $2 LIMIT 1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to probe for duplicate identity")?;
        Ok(row.is_some())
    }

    async fn find_by_verification_token(&self, token: &str) -> Result<Option<User>> {
        let query = "SELECT * FROM users WHERE verification_token = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by verification token")?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert(&self, user: User) -> Result<()> {
        let query = r"
            INSERT INTO users
                (username, email, password_hash, role, birthday, verified,
                 verification_token, verification_expiry)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.birthday)
            .bind(user.verified)
            .bind(&user.verification_token)
            .bind(user.verification_expiry)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert user")?;
        Ok(())
    }

    async fn mark_verified(&self, username: &str) -> Result<bool> {
        // Flag flip and token cleanup in one statement.
        let query = r"
            UPDATE users
            SET verified = TRUE, verification_token = NULL, verification_expiry = NULL
            WHERE username = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(username)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to mark user verified")?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_verification(
        &self,
        email: &str,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<bool> {
        let query = r"
            UPDATE users
            SET verification_token = $2, verification_expiry = $3
            WHERE email = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(email)
            .bind(token)
            .bind(expiry)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to overwrite verification token")?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> Result<bool> {
        let query = "UPDATE users SET password_hash = $2 WHERE email = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(email)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update password")?;
        Ok(result.rows_affected() > 0)
    }

    async fn with_birthday(&self, month_day: &str) -> Result<Vec<User>> {
        let query = r"
            SELECT * FROM users
            WHERE birthday IS NOT NULL
              AND to_char(birthday, 'MM-DD') = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(month_day)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list birthdays")?;
        rows.iter().map(user_from_row).collect()
    }
}

#[derive(Clone, Debug)]
pub struct PgLessonStore {
    pool: PgPool,
}

impl PgLessonStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LessonStore for PgLessonStore {
    async fn insert(&self, lesson: Lesson) -> Result<Uuid> {
        let query = r"
            INSERT INTO lessons
                (id, teacher_name, kind, students, date, hours, subject,
                 education_level, approved)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(lesson.id)
            .bind(&lesson.teacher_name)
            .bind(kind_str(lesson.kind))
            .bind(&lesson.students)
            .bind(lesson.date.as_text())
            .bind(lesson.hours)
            .bind(&lesson.subject)
            .bind(&lesson.education_level)
            .bind(lesson.approved)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert lesson")?;
        Ok(lesson.id)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Lesson>> {
        let query = "SELECT * FROM lessons WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup lesson")?;
        row.as_ref().map(lesson_from_row).transpose()
    }

    async fn update_pending_owned(
        &self,
        id: Uuid,
        owner: &str,
        patch: LessonPatch,
    ) -> Result<bool> {
        // Owner + pending predicate in the statement itself; the patch can
        // never touch `approved`.
        let query = r"
            UPDATE lessons
            SET students = COALESCE($3, students),
                date = COALESCE($4, date),
                hours = COALESCE($5, hours),
                subject = COALESCE($6, subject),
                education_level = COALESCE($7, education_level)
            WHERE id = $1 AND teacher_name = $2 AND approved = FALSE
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(owner)
            .bind(patch.students)
            .bind(patch.date.map(|d| d.as_text()))
            .bind(patch.hours)
            .bind(patch.subject)
            .bind(patch.education_level)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update lesson")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_pending_owned(&self, id: Uuid, owner: &str) -> Result<bool> {
        let query =
            "DELETE FROM lessons WHERE id = $1 AND teacher_name = $2 AND approved = FALSE";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete lesson")?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_approved(&self, id: Uuid) -> Result<bool> {
        let query = "UPDATE lessons SET approved = TRUE WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to approve lesson")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let query = "DELETE FROM lessons WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete lesson")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, owner: Option<&str>, approved: bool) -> Result<Vec<Lesson>> {
        let query = r"
            SELECT * FROM lessons
            WHERE approved = $1 AND ($2::text IS NULL OR teacher_name = $2)
            ORDER BY date
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(approved)
            .bind(owner)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list lessons")?;
        rows.iter().map(lesson_from_row).collect()
    }

    async fn list_approved_in_month(&self, month: &str) -> Result<Vec<Lesson>> {
        // Dates are stored as text in either RFC 3339 or plain `YYYY-MM-DD`
        // form; both start with the `YYYY-MM` key, so one prefix match
        // covers both.
        let query = r"
            SELECT * FROM lessons
            WHERE approved = TRUE AND date LIKE $1 || '%'
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(month)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list approved lessons for month")?;
        rows.iter().map(lesson_from_row).collect()
    }
}

#[derive(Clone, Debug)]
pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn insert(&self, payment: Payment) -> Result<Uuid> {
        let query = r"
            INSERT INTO student_payments (id, name, cost, date)
            VALUES ($1, $2, $3, $4)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(payment.id)
            .bind(&payment.name)
            .bind(payment.cost)
            .bind(&payment.date)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert payment")?;
        Ok(payment.id)
    }

    async fn list_in_month(&self, month: &str) -> Result<Vec<Payment>> {
        let query = r"
            SELECT * FROM student_payments
            WHERE date LIKE $1 || '%'
            ORDER BY date
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(month)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list payments for month")?;
        Ok(rows
            .iter()
            .map(|row| Payment {
                id: row.get("id"),
                name: row.get("name"),
                cost: row.get("cost"),
                date: row.get("date"),
            })
            .collect())
    }
}

#[derive(Clone, Debug)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn insert(&self, booking: Booking) -> Result<Uuid> {
        let query = r"
            INSERT INTO bookings
                (id, parent_name, phone, subject, age_level, lesson_date,
                 lesson_time, hours, notes, lesson_type, students, status,
                 booking_date, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(booking.id)
            .bind(&booking.parent_name)
            .bind(&booking.phone)
            .bind(&booking.subject)
            .bind(&booking.age_level)
            .bind(&booking.lesson_date)
            .bind(&booking.lesson_time)
            .bind(booking.hours)
            .bind(&booking.notes)
            .bind(kind_str(booking.lesson_type))
            .bind(&booking.students)
            .bind(booking.status.as_str())
            .bind(&booking.booking_date)
            .bind(booking.created_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert booking")?;
        Ok(booking.id)
    }

    async fn update_status(&self, id: Uuid, status: BookingStatus) -> Result<Option<Booking>> {
        let query = "UPDATE bookings SET status = $2 WHERE id = $1 RETURNING *";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to update booking status")?;
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn list_by_booking_date(&self, date: &str) -> Result<Vec<Booking>> {
        let query = r"
            SELECT * FROM bookings
            WHERE booking_date = $1
            ORDER BY lesson_date, lesson_time
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(date)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list bookings by booking date")?;
        rows.iter().map(booking_from_row).collect()
    }

    async fn list_by_lesson_date(&self, date: &str) -> Result<Vec<Booking>> {
        let query = r"
            SELECT * FROM bookings
            WHERE lesson_date = $1
            ORDER BY lesson_date, lesson_time
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(date)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list bookings by lesson date")?;
        rows.iter().map(booking_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_date, parse_kind, parse_role, parse_status};
    use crate::domain::{LessonDate, LessonKind, Role};

    #[test]
    fn role_and_kind_parsers_reject_unknown_values() {
        assert_eq!(parse_role("teacher").unwrap(), Role::Teacher);
        assert!(parse_role("superuser").is_err());
        assert_eq!(parse_kind("group").unwrap(), LessonKind::Group);
        assert!(parse_kind("pair").is_err());
        assert!(parse_status("archived").is_err());
    }

    #[test]
    fn stored_date_text_keeps_its_form() {
        assert!(matches!(
            parse_date("2025-03-14T16:00:00+00:00".to_string()),
            LessonDate::Timestamp(_)
        ));
        assert!(matches!(
            parse_date("2025-03-14".to_string()),
            LessonDate::Text(_)
        ));
    }
}
