//! Lesson approval state machine and the month-filtered statistics over it.
//!
//! A lesson is `pending` from submission until an admin approves (flag set)
//! or rejects (destructive delete). The owning teacher may edit or delete
//! only while pending; once approved, the record is admin-owned.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::OnceLock;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Lesson, LessonDate, LessonKind, LessonPatch};
use crate::error::ApiError;
use crate::store::LessonStore;

/// Teacher-submitted payload. Deliberately no `approved` field: the flag is
/// forced false at submission no matter what the client sends.
#[derive(ToSchema, Clone, Debug, serde::Deserialize)]
pub struct LessonSubmission {
    pub kind: LessonKind,
    pub students: Vec<String>,
    pub date: LessonDate,
    pub hours: f64,
    pub subject: String,
    pub education_level: String,
}

/// Per-teacher hour totals for one month, split by lesson kind and grouped
/// by education level.
#[derive(ToSchema, Clone, Debug, Default, Serialize)]
pub struct TeacherMonthStats {
    pub teacher_name: String,
    pub total_individual_hours: f64,
    pub total_group_hours: f64,
    pub education_levels_individual: BTreeMap<String, f64>,
    pub education_levels_group: BTreeMap<String, f64>,
}

/// Per-student hour totals for one month.
#[derive(ToSchema, Clone, Debug, Default, Serialize)]
pub struct StudentMonthStats {
    pub student_name: String,
    pub total_individual_hours: f64,
    pub total_group_hours: f64,
    pub education_level: String,
}

/// One teacher's own approved totals, the view behind their dashboard.
#[derive(ToSchema, Clone, Debug, Default, Serialize)]
pub struct DashboardOverview {
    pub total_lessons: usize,
    pub total_hours: f64,
    pub individual_hours_by_level: BTreeMap<String, f64>,
    pub group_hours_by_level: BTreeMap<String, f64>,
}

pub struct LessonService {
    lessons: Arc<dyn LessonStore>,
}

pub(crate) fn month_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").expect("valid month regex"))
}

fn clean_students(students: Vec<String>) -> Vec<String> {
    students
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl LessonService {
    pub fn new(lessons: Arc<dyn LessonStore>) -> Self {
        Self { lessons }
    }

    /// Submit a lesson as the authenticated teacher. Stamps ownership and
    /// forces `approved = false`.
    pub async fn submit(
        &self,
        teacher: &str,
        submission: LessonSubmission,
    ) -> Result<Uuid, ApiError> {
        let students = clean_students(submission.students);
        submission
            .kind
            .check_students(&students)
            .map_err(ApiError::Validation)?;
        if submission.hours <= 0.0 {
            return Err(ApiError::Validation("Hours must be positive".to_string()));
        }

        let lesson = Lesson {
            id: Uuid::new_v4(),
            teacher_name: teacher.to_string(),
            kind: submission.kind,
            students,
            date: submission.date,
            hours: submission.hours,
            subject: submission.subject,
            education_level: submission.education_level,
            approved: false,
        };
        Ok(self.lessons.insert(lesson).await?)
    }

    /// Edit an owned, still-pending lesson. The store predicate carries
    /// owner + status, so the check-and-mutate is one atomic update.
    pub async fn edit(
        &self,
        teacher: &str,
        id: Uuid,
        mut patch: LessonPatch,
    ) -> Result<(), ApiError> {
        if let Some(students) = patch.students.take() {
            let students = clean_students(students);
            // Cardinality is validated against the stored kind; a
            // mismatched owner or an approved lesson gets the conflated
            // error before anything else is revealed.
            let existing = self
                .lessons
                .find(id)
                .await?
                .filter(|l| l.teacher_name == teacher && !l.approved)
                .ok_or(ApiError::NotFoundOrUnauthorized)?;
            existing
                .kind
                .check_students(&students)
                .map_err(ApiError::Validation)?;
            patch.students = Some(students);
        }
        if let Some(hours) = patch.hours {
            if hours <= 0.0 {
                return Err(ApiError::Validation("Hours must be positive".to_string()));
            }
        }

        if self.lessons.update_pending_owned(id, teacher, patch).await? {
            Ok(())
        } else {
            Err(ApiError::NotFoundOrUnauthorized)
        }
    }

    /// Delete an owned, still-pending lesson.
    pub async fn delete(&self, teacher: &str, id: Uuid) -> Result<(), ApiError> {
        if self.lessons.delete_pending_owned(id, teacher).await? {
            Ok(())
        } else {
            Err(ApiError::NotFoundOrUnauthorized)
        }
    }

    /// Admin approval; idempotent on already-approved lessons.
    pub async fn approve(&self, id: Uuid) -> Result<(), ApiError> {
        if self.lessons.set_approved(id).await? {
            Ok(())
        } else {
            Err(ApiError::NotFound("Lesson"))
        }
    }

    /// Admin rejection is a destructive delete, not a status flag: a
    /// rejected lesson is gone, distinct from one waiting unapproved.
    pub async fn reject(&self, id: Uuid) -> Result<(), ApiError> {
        if self.lessons.delete(id).await? {
            Ok(())
        } else {
            Err(ApiError::NotFound("Lesson"))
        }
    }

    /// Unconditional admin delete, bypassing ownership and state.
    pub async fn admin_delete(&self, id: Uuid) -> Result<(), ApiError> {
        self.reject(id).await
    }

    pub async fn list_pending(&self, owner: Option<&str>) -> Result<Vec<Lesson>, ApiError> {
        Ok(self.lessons.list(owner, false).await?)
    }

    pub async fn list_approved(&self, owner: Option<&str>) -> Result<Vec<Lesson>, ApiError> {
        Ok(self.lessons.list(owner, true).await?)
    }

    /// Hours per teacher for a `YYYY-MM` month, approved lessons only.
    pub async fn teacher_stats(&self, month: &str) -> Result<Vec<TeacherMonthStats>, ApiError> {
        let lessons = self.approved_in_month(month).await?;

        let mut stats: BTreeMap<String, TeacherMonthStats> = BTreeMap::new();
        for lesson in &lessons {
            let entry = stats
                .entry(lesson.teacher_name.clone())
                .or_insert_with(|| TeacherMonthStats {
                    teacher_name: lesson.teacher_name.clone(),
                    ..TeacherMonthStats::default()
                });
            match lesson.kind {
                LessonKind::Individual => {
                    entry.total_individual_hours += lesson.hours;
                    *entry
                        .education_levels_individual
                        .entry(lesson.education_level.clone())
                        .or_default() += lesson.hours;
                }
                LessonKind::Group => {
                    entry.total_group_hours += lesson.hours;
                    *entry
                        .education_levels_group
                        .entry(lesson.education_level.clone())
                        .or_default() += lesson.hours;
                }
            }
        }
        Ok(stats.into_values().collect())
    }

    /// Hours per student for a `YYYY-MM` month: individual hours from their
    /// own lessons, group hours from every group lesson naming them.
    pub async fn student_stats(&self, month: &str) -> Result<Vec<StudentMonthStats>, ApiError> {
        let lessons = self.approved_in_month(month).await?;

        let mut stats: BTreeMap<String, StudentMonthStats> = BTreeMap::new();
        for lesson in &lessons {
            for student in &lesson.students {
                let entry = stats
                    .entry(student.clone())
                    .or_insert_with(|| StudentMonthStats {
                        student_name: student.clone(),
                        education_level: lesson.education_level.clone(),
                        ..StudentMonthStats::default()
                    });
                match lesson.kind {
                    LessonKind::Individual => entry.total_individual_hours += lesson.hours,
                    LessonKind::Group => entry.total_group_hours += lesson.hours,
                }
            }
        }
        Ok(stats.into_values().collect())
    }

    /// Approved totals for the calling teacher, optionally narrowed to one
    /// `YYYY-MM` month. Only the caller's own lessons count.
    pub async fn dashboard_overview(
        &self,
        teacher: &str,
        month: Option<&str>,
    ) -> Result<DashboardOverview, ApiError> {
        let lessons = match month {
            Some(month) => self.approved_in_month(month).await?,
            None => self.lessons.list(Some(teacher), true).await?,
        };

        let mut overview = DashboardOverview::default();
        for lesson in lessons.iter().filter(|l| l.teacher_name == teacher) {
            overview.total_lessons += 1;
            overview.total_hours += lesson.hours;
            let by_level = match lesson.kind {
                LessonKind::Individual => &mut overview.individual_hours_by_level,
                LessonKind::Group => &mut overview.group_hours_by_level,
            };
            *by_level.entry(lesson.education_level.clone()).or_default() += lesson.hours;
        }
        Ok(overview)
    }

    async fn approved_in_month(&self, month: &str) -> Result<Vec<Lesson>, ApiError> {
        if !month_key_regex().is_match(month) {
            return Err(ApiError::Validation(
                "Invalid month format. Use YYYY-MM".to_string(),
            ));
        }
        Ok(self.lessons.list_approved_in_month(month).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::{LessonService, LessonSubmission};
    use crate::domain::{LessonDate, LessonKind, LessonPatch};
    use crate::error::ApiError;
    use crate::store::{LessonStore, MemoryLessonStore};
    use std::sync::Arc;
    use uuid::Uuid;

    fn service() -> (LessonService, Arc<MemoryLessonStore>) {
        let store = Arc::new(MemoryLessonStore::new());
        (LessonService::new(store.clone()), store)
    }

    fn submission(kind: LessonKind, students: &[&str]) -> LessonSubmission {
        LessonSubmission {
            kind,
            students: students.iter().map(|s| (*s).to_string()).collect(),
            date: LessonDate::Text("2025-03-10".to_string()),
            hours: 2.0,
            subject: "Math".to_string(),
            education_level: "secondary".to_string(),
        }
    }

    #[tokio::test]
    async fn group_submission_needs_two_students() {
        let (service, _) = service();
        let result = service
            .submit("amal", submission(LessonKind::Group, &["Sami"]))
            .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));

        let ok = service
            .submit("amal", submission(LessonKind::Group, &["Sami", "Dana"]))
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn blank_student_names_are_dropped_before_the_check() {
        let (service, _) = service();
        let result = service
            .submit(
                "amal",
                submission(LessonKind::Group, &["Sami", "  ", "Dana"]),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn other_teachers_cannot_touch_a_lesson() {
        let (service, _) = service();
        let id = service
            .submit("amal", submission(LessonKind::Individual, &["Sami"]))
            .await
            .unwrap();

        let patch = LessonPatch {
            hours: Some(3.0),
            ..LessonPatch::default()
        };
        assert!(matches!(
            service.edit("badr", id, patch).await,
            Err(ApiError::NotFoundOrUnauthorized)
        ));
        assert!(matches!(
            service.delete("badr", id).await,
            Err(ApiError::NotFoundOrUnauthorized)
        ));
    }

    #[tokio::test]
    async fn approval_locks_out_the_owner_but_not_the_admin() {
        let (service, store) = service();
        let id = service
            .submit("amal", submission(LessonKind::Individual, &["Sami"]))
            .await
            .unwrap();
        service.approve(id).await.unwrap();

        let patch = LessonPatch {
            hours: Some(3.0),
            ..LessonPatch::default()
        };
        assert!(matches!(
            service.edit("amal", id, patch).await,
            Err(ApiError::NotFoundOrUnauthorized)
        ));
        assert!(matches!(
            service.delete("amal", id).await,
            Err(ApiError::NotFoundOrUnauthorized)
        ));

        // Approve again: idempotent.
        service.approve(id).await.unwrap();
        // The admin can still remove it.
        service.admin_delete(id).await.unwrap();
        assert!(store.find(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reject_removes_the_record_entirely() {
        let (service, store) = service();
        let id = service
            .submit("amal", submission(LessonKind::Individual, &["Sami"]))
            .await
            .unwrap();
        service.reject(id).await.unwrap();
        // Gone, not merely unapproved.
        assert!(store.find(id).await.unwrap().is_none());
        assert!(matches!(
            service.reject(id).await,
            Err(ApiError::NotFound("Lesson"))
        ));
    }

    #[tokio::test]
    async fn unknown_lesson_approval_is_not_found() {
        let (service, _) = service();
        assert!(matches!(
            service.approve(Uuid::new_v4()).await,
            Err(ApiError::NotFound("Lesson"))
        ));
    }

    #[tokio::test]
    async fn submitted_lesson_flows_pending_to_approved_to_stats() {
        let (service, _) = service();
        let id = service
            .submit("amal", submission(LessonKind::Individual, &["Sami"]))
            .await
            .unwrap();

        // Visible in the owner's pending list only.
        let pending_amal = service.list_pending(Some("amal")).await.unwrap();
        assert_eq!(pending_amal.len(), 1);
        assert!(service.list_approved(Some("amal")).await.unwrap().is_empty());
        assert!(service.list_pending(Some("badr")).await.unwrap().is_empty());

        service.approve(id).await.unwrap();
        assert!(service.list_pending(Some("amal")).await.unwrap().is_empty());
        assert_eq!(service.list_approved(Some("amal")).await.unwrap().len(), 1);

        // And it now counts toward the month aggregate.
        let stats = service.teacher_stats("2025-03").await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].teacher_name, "amal");
        assert!((stats[0].total_individual_hours - 2.0).abs() < f64::EPSILON);
        assert!(
            (stats[0].education_levels_individual["secondary"] - 2.0).abs() < f64::EPSILON
        );
    }

    #[tokio::test]
    async fn pending_lessons_do_not_count_toward_stats() {
        let (service, _) = service();
        service
            .submit("amal", submission(LessonKind::Individual, &["Sami"]))
            .await
            .unwrap();
        assert!(service.teacher_stats("2025-03").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stats_match_both_date_forms() {
        let (service, _) = service();
        let textual = service
            .submit("amal", submission(LessonKind::Individual, &["Sami"]))
            .await
            .unwrap();
        let mut structured = submission(LessonKind::Group, &["Sami", "Dana"]);
        structured.date = LessonDate::Timestamp(
            chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2025, 3, 20, 15, 0, 0).unwrap(),
        );
        let ts_id = service.submit("amal", structured).await.unwrap();
        service.approve(textual).await.unwrap();
        service.approve(ts_id).await.unwrap();

        let stats = service.teacher_stats("2025-03").await.unwrap();
        assert!((stats[0].total_individual_hours - 2.0).abs() < f64::EPSILON);
        assert!((stats[0].total_group_hours - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn student_stats_split_individual_and_group_hours() {
        let (service, _) = service();
        let solo = service
            .submit("amal", submission(LessonKind::Individual, &["Sami"]))
            .await
            .unwrap();
        let group = service
            .submit("amal", submission(LessonKind::Group, &["Sami", "Dana"]))
            .await
            .unwrap();
        service.approve(solo).await.unwrap();
        service.approve(group).await.unwrap();

        let stats = service.student_stats("2025-03").await.unwrap();
        let sami = stats.iter().find(|s| s.student_name == "Sami").unwrap();
        assert!((sami.total_individual_hours - 2.0).abs() < f64::EPSILON);
        assert!((sami.total_group_hours - 2.0).abs() < f64::EPSILON);
        let dana = stats.iter().find(|s| s.student_name == "Dana").unwrap();
        assert!((dana.total_individual_hours - 0.0).abs() < f64::EPSILON);
        assert!((dana.total_group_hours - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn dashboard_overview_counts_only_the_callers_approved_lessons() {
        let (service, _) = service();
        let own = service
            .submit("amal", submission(LessonKind::Individual, &["Sami"]))
            .await
            .unwrap();
        let own_group = service
            .submit("amal", submission(LessonKind::Group, &["Sami", "Dana"]))
            .await
            .unwrap();
        let other = service
            .submit("badr", submission(LessonKind::Individual, &["Nour"]))
            .await
            .unwrap();
        // Still pending, must not count.
        service
            .submit("amal", submission(LessonKind::Individual, &["Sami"]))
            .await
            .unwrap();
        service.approve(own).await.unwrap();
        service.approve(own_group).await.unwrap();
        service.approve(other).await.unwrap();

        let overview = service
            .dashboard_overview("amal", Some("2025-03"))
            .await
            .unwrap();
        assert_eq!(overview.total_lessons, 2);
        assert!((overview.total_hours - 4.0).abs() < f64::EPSILON);
        assert!(
            (overview.individual_hours_by_level["secondary"] - 2.0).abs() < f64::EPSILON
        );
        assert!((overview.group_hours_by_level["secondary"] - 2.0).abs() < f64::EPSILON);

        // No month key covers everything approved for the caller.
        let all_time = service.dashboard_overview("amal", None).await.unwrap();
        assert_eq!(all_time.total_lessons, 2);

        assert!(matches!(
            service.dashboard_overview("amal", Some("2025-3")).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn bad_month_key_is_a_validation_error() {
        let (service, _) = service();
        for month in ["2025-13", "2025/03", "march", "25-03"] {
            assert!(matches!(
                service.teacher_stats(month).await,
                Err(ApiError::Validation(_))
            ));
        }
    }
}
