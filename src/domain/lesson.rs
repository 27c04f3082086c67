//! Lesson record and the one-or-many participants model.
//!
//! Individual and group lessons share one record type with a `kind`
//! discriminant; the approval state machine is identical for both, only the
//! participant cardinality rule differs.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonKind {
    Individual,
    Group,
}

impl LessonKind {
    /// Cardinality rule: exactly one student for individual lessons, at
    /// least two for group lessons. Names are assumed already trimmed.
    pub fn check_students(&self, students: &[String]) -> Result<(), String> {
        match self {
            Self::Individual if students.len() != 1 => {
                Err("Individual lessons must have exactly one student".to_string())
            }
            Self::Group if students.len() < 2 => {
                Err("Group lessons must have at least two students".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Lesson dates arrive either as a structured timestamp or as a plain
/// string; both forms are kept as submitted and both must answer month
/// filters.
#[derive(ToSchema, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LessonDate {
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl LessonDate {
    /// Match against a `YYYY-MM` month key: month compare for timestamps,
    /// prefix compare for strings.
    #[must_use]
    pub fn in_month(&self, month: &str) -> bool {
        match self {
            Self::Timestamp(ts) => format!("{:04}-{:02}", ts.year(), ts.month()) == month,
            Self::Text(text) => text.starts_with(month),
        }
    }

    /// Canonical text form, used for store columns and CSV export.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Timestamp(ts) => ts.to_rfc3339(),
            Self::Text(text) => text.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Uuid,
    pub teacher_name: String,
    pub kind: LessonKind,
    pub students: Vec<String>,
    pub date: LessonDate,
    pub hours: f64,
    pub subject: String,
    pub education_level: String,
    pub approved: bool,
}

/// Mutable subset a teacher may patch. There is deliberately no `approved`
/// field here: a teacher can never flip their own approval flag.
#[derive(ToSchema, Clone, Debug, Default, Deserialize)]
pub struct LessonPatch {
    pub students: Option<Vec<String>>,
    pub date: Option<LessonDate>,
    pub hours: Option<f64>,
    pub subject: Option<String>,
    pub education_level: Option<String>,
}

impl Lesson {
    pub fn apply(&mut self, patch: LessonPatch) {
        if let Some(students) = patch.students {
            self.students = students;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(hours) = patch.hours {
            self.hours = hours;
        }
        if let Some(subject) = patch.subject {
            self.subject = subject;
        }
        if let Some(education_level) = patch.education_level {
            self.education_level = education_level;
        }
    }
}
