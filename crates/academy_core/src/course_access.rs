//! crates/academy_core/src/course_access.rs
//!
//! Resolves what a visitor can see of a course: which lessons are unlocked,
//! which lesson is selected first, what has been completed, and whether to
//! offer enrollment.
//!
//! Per lesson the observable state only ever moves forward:
//! `Locked -> Unlocked(NotStarted) -> Unlocked(Completed)`.

use serde::Serialize;
use serde_json::json;
use std::collections::BTreeSet;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Course, Enrollment, Lesson, LessonProgress};
use crate::error::{CoreError, CoreResult};
use crate::ports::{functions, Backend, Collection, PortError, Query, SortDirection};
use crate::records::{fetch_all, fetch_by_id, fetch_optional};

//=========================================================================================
// Pure Policies
//=========================================================================================

/// A lesson is accessible when the viewer is enrolled or the lesson is a preview.
pub fn can_access_lesson(lesson: &Lesson, enrollment: Option<&Enrollment>) -> bool {
    enrollment.is_some() || lesson.is_preview
}

/// The lowest-ordered preview lesson, else the lowest-ordered lesson, else nothing.
pub fn select_default_lesson(lessons: &[Lesson]) -> Option<&Lesson> {
    lessons
        .iter()
        .filter(|l| l.is_preview)
        .min_by_key(|l| l.order_index)
        .or_else(|| lessons.iter().min_by_key(|l| l.order_index))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    NotStarted,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "access", content = "completion", rename_all = "snake_case")]
pub enum LessonState {
    Locked,
    Unlocked(Completion),
}

/// What the course page offers the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentAction {
    SignInToEnroll,
    Enroll,
    Enrolled,
}

//=========================================================================================
// The View Model
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseView {
    pub course: Course,
    /// Sorted by `order_index`.
    pub lessons: Vec<Lesson>,
    pub enrollment: Option<Enrollment>,
    pub completed: BTreeSet<Uuid>,
    pub selected: Option<Uuid>,
    pub viewer: Option<Uuid>,
}

impl CourseView {
    pub fn lesson(&self, lesson_id: Uuid) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id == lesson_id)
    }

    pub fn selected_lesson(&self) -> Option<&Lesson> {
        self.selected.and_then(|id| self.lesson(id))
    }

    pub fn can_access(&self, lesson: &Lesson) -> bool {
        can_access_lesson(lesson, self.enrollment.as_ref())
    }

    pub fn lesson_state(&self, lesson: &Lesson) -> LessonState {
        if !self.can_access(lesson) {
            LessonState::Locked
        } else if self.completed.contains(&lesson.id) {
            LessonState::Unlocked(Completion::Completed)
        } else {
            LessonState::Unlocked(Completion::NotStarted)
        }
    }

    /// "Lesson N of M", 1-based.
    pub fn lesson_position(&self, lesson_id: Uuid) -> Option<(usize, usize)> {
        self.lessons
            .iter()
            .position(|l| l.id == lesson_id)
            .map(|i| (i + 1, self.lessons.len()))
    }

    pub fn completed_count(&self) -> usize {
        self.lessons.iter().filter(|l| self.completed.contains(&l.id)).count()
    }

    /// The server-computed percentage; 0 when not enrolled.
    pub fn progress_percentage(&self) -> f64 {
        self.enrollment.as_ref().map_or(0.0, |e| e.progress_percentage)
    }

    pub fn enrollment_action(&self) -> EnrollmentAction {
        match (&self.viewer, &self.enrollment) {
            (_, Some(_)) => EnrollmentAction::Enrolled,
            (Some(_), None) => EnrollmentAction::Enroll,
            (None, None) => EnrollmentAction::SignInToEnroll,
        }
    }

    /// Moves the selection to `lesson_id` if the viewer may open it.
    pub fn select_lesson(&mut self, lesson_id: Uuid) -> bool {
        match self.lesson(lesson_id) {
            Some(lesson) if self.can_access(lesson) => {
                self.selected = Some(lesson_id);
                true
            }
            _ => false,
        }
    }
}

//=========================================================================================
// The Resolver Service
//=========================================================================================

#[derive(Clone)]
pub struct CourseAccess {
    backend: Backend,
}

impl CourseAccess {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Loads the course, its lessons and, for a signed-in viewer, their enrollment and progress.
    #[instrument(skip(self))]
    pub async fn load_course_view(&self, course_id: Uuid, user_id: Option<Uuid>) -> CoreResult<CourseView> {
        let store = self.backend.store.as_ref();
        let course: Course = fetch_by_id(store, Collection::Courses, course_id)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => CoreError::NotFound(format!("Course {}", course_id)),
                other => other.into(),
            })?;

        let lessons_query = Query::new(Collection::Lessons)
            .eq("course_id", course_id)
            .order_by("order_index", SortDirection::Ascending);
        let lessons = async { fetch_all::<Lesson>(store, &lessons_query).await };

        let viewer_state = async {
            let Some(user_id) = user_id else {
                return Ok((None, BTreeSet::new()));
            };
            futures::try_join!(
                self.fetch_enrollment(course_id, user_id),
                self.fetch_completed(course_id, user_id)
            )
        };

        let (mut lessons, (enrollment, completed)) = futures::try_join!(lessons, viewer_state)?;
        lessons.sort_by_key(|l| l.order_index);
        let selected = select_default_lesson(&lessons).map(|l| l.id);

        Ok(CourseView {
            course,
            lessons,
            enrollment,
            completed,
            selected,
            viewer: user_id,
        })
    }

    async fn fetch_enrollment(&self, course_id: Uuid, user_id: Uuid) -> Result<Option<Enrollment>, PortError> {
        fetch_optional(
            self.backend.store.as_ref(),
            Query::new(Collection::Enrollments)
                .eq("user_id", user_id)
                .eq("course_id", course_id),
        )
        .await
    }

    async fn fetch_completed(&self, course_id: Uuid, user_id: Uuid) -> Result<BTreeSet<Uuid>, PortError> {
        let query = Query::new(Collection::LessonProgress)
            .eq("user_id", user_id)
            .eq("course_id", course_id)
            .eq("completed", true);
        let rows: Vec<LessonProgress> = fetch_all(self.backend.store.as_ref(), &query).await?;
        Ok(rows.into_iter().map(|p| p.lesson_id).collect())
    }

    /// Enrolls the viewer, then reloads the view. On failure `view` is left untouched.
    #[instrument(skip(self, view), fields(course_id = %view.course.id))]
    pub async fn enroll(&self, view: &mut CourseView, user_id: Uuid) -> CoreResult<()> {
        if view.enrollment.is_some() {
            return Ok(());
        }
        let course_id = view.course.id;
        self.backend
            .functions
            .invoke(functions::ENROLL_COURSE, json!({ "courseId": course_id }))
            .await
            .map_err(|e| {
                error!("Enrollment failed: {}", e);
                CoreError::from(e)
            })?;
        info!(%user_id, "Enrolled in course");

        let mut refreshed = self.load_course_view(course_id, Some(user_id)).await?;
        if let Some(previous) = view.selected {
            refreshed.select_lesson(previous);
        }
        *view = refreshed;
        Ok(())
    }

    /// Marks a lesson complete. Completing an already-completed lesson is a no-op.
    #[instrument(skip(self, view), fields(course_id = %view.course.id))]
    pub async fn mark_lesson_complete(&self, view: &mut CourseView, lesson_id: Uuid, user_id: Uuid) -> CoreResult<()> {
        if view.completed.contains(&lesson_id) {
            return Ok(());
        }
        if view.lesson(lesson_id).is_none() {
            return Err(CoreError::NotFound(format!("Lesson {}", lesson_id)));
        }
        if view.enrollment.is_none() {
            return Err(CoreError::Forbidden);
        }

        let course_id = view.course.id;
        let body = json!({ "lessonId": lesson_id, "courseId": course_id, "completed": true });
        if let Err(e) = self.backend.functions.invoke(functions::UPDATE_PROGRESS, body).await {
            error!("Failed to record lesson progress: {}", e);
            return Err(e.into());
        }
        view.completed.insert(lesson_id);

        // The percentage is server-computed; a failed re-read keeps the stale value.
        match self.fetch_enrollment(course_id, user_id).await {
            Ok(Some(enrollment)) => view.enrollment = Some(enrollment),
            Ok(None) => warn!("Enrollment vanished while refreshing progress"),
            Err(e) => warn!("Failed to refresh progress: {}", e),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    fn lesson(order_index: i32, is_preview: bool) -> Lesson {
        Lesson {
            id: Uuid::new_v4(),
            course_id: Uuid::nil(),
            title_ar: format!("درس {}", order_index),
            title_en: format!("Lesson {}", order_index),
            description_ar: None,
            description_en: None,
            video_url: None,
            duration_minutes: None,
            order_index,
            is_preview,
        }
    }

    fn enrollment() -> Enrollment {
        Enrollment {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            course_id: Uuid::nil(),
            progress_percentage: 0.0,
            enrolled_at: None,
        }
    }

    /// Seeds a course with three lessons where only lesson 2 is a preview.
    async fn seed_course(backend: &MemoryBackend) -> (Uuid, Vec<Uuid>) {
        let course_id = Uuid::new_v4();
        backend
            .seed(
                Collection::Courses,
                json!({
                    "id": course_id, "title_ar": "دورة", "title_en": "Course",
                    "price": 1000.0, "level": "beginner", "is_published": true,
                }),
            )
            .await
            .unwrap();
        let mut ids = Vec::new();
        // inserted out of order on purpose
        for (index, preview) in [(3, false), (1, false), (2, true)] {
            let id = Uuid::new_v4();
            backend
                .seed(
                    Collection::Lessons,
                    json!({
                        "id": id, "course_id": course_id, "title_ar": "درس", "title_en": "Lesson",
                        "order_index": index, "is_preview": preview,
                    }),
                )
                .await
                .unwrap();
            ids.push((index, id));
        }
        ids.sort();
        (course_id, ids.into_iter().map(|(_, id)| id).collect())
    }

    #[test]
    fn test_default_lesson_prefers_lowest_preview() {
        let lessons = vec![lesson(3, true), lesson(1, false), lesson(2, true)];
        assert_eq!(select_default_lesson(&lessons).unwrap().order_index, 2);
    }

    #[test]
    fn test_default_lesson_falls_back_to_first_by_order() {
        let lessons = vec![lesson(5, false), lesson(4, false)];
        assert_eq!(select_default_lesson(&lessons).unwrap().order_index, 4);
        assert!(select_default_lesson(&[]).is_none());
    }

    #[test]
    fn test_access_requires_enrollment_or_preview() {
        let locked = lesson(1, false);
        let preview = lesson(2, true);
        let enrolled = enrollment();

        assert!(!can_access_lesson(&locked, None));
        assert!(can_access_lesson(&preview, None));
        assert!(can_access_lesson(&locked, Some(&enrolled)));
        assert!(can_access_lesson(&preview, Some(&enrolled)));
    }

    #[tokio::test]
    async fn test_anonymous_view_selects_preview_and_locks_the_rest() {
        let backend = MemoryBackend::new();
        let (course_id, ids) = seed_course(&backend).await;
        let access = CourseAccess::new(backend.backend(None));

        let view = access.load_course_view(course_id, None).await.unwrap();

        assert_eq!(view.selected, Some(ids[1]));
        assert_eq!(view.lessons.iter().map(|l| l.order_index).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(view.lesson_state(&view.lessons[0]), LessonState::Locked);
        assert_eq!(view.lesson_state(&view.lessons[1]), LessonState::Unlocked(Completion::NotStarted));
        assert_eq!(view.lesson_state(&view.lessons[2]), LessonState::Locked);
        assert_eq!(view.lesson_position(ids[2]), Some((3, 3)));
        assert_eq!(view.enrollment_action(), EnrollmentAction::SignInToEnroll);
    }

    #[tokio::test]
    async fn test_missing_course_is_not_found() {
        let backend = MemoryBackend::new();
        let access = CourseAccess::new(backend.backend(None));

        let err = access.load_course_view(Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_enroll_unlocks_every_lesson() {
        let backend = MemoryBackend::new();
        let (course_id, ids) = seed_course(&backend).await;
        let user_id = Uuid::new_v4();
        let access = CourseAccess::new(backend.backend(Some(user_id)));

        let mut view = access.load_course_view(course_id, Some(user_id)).await.unwrap();
        assert_eq!(view.enrollment_action(), EnrollmentAction::Enroll);
        assert!(!view.select_lesson(ids[0]));

        access.enroll(&mut view, user_id).await.unwrap();

        assert_eq!(view.enrollment_action(), EnrollmentAction::Enrolled);
        assert!(view.lessons.iter().all(|l| view.lesson_state(l) != LessonState::Locked));
        assert!(view.select_lesson(ids[0]));
    }

    #[tokio::test]
    async fn test_failed_enroll_keeps_state_and_surfaces_message() {
        let backend = MemoryBackend::new();
        let (course_id, _) = seed_course(&backend).await;
        let user_id = Uuid::new_v4();
        let access = CourseAccess::new(backend.backend(Some(user_id)));
        backend.fail_function(functions::ENROLL_COURSE, "Payment required").await;

        let mut view = access.load_course_view(course_id, Some(user_id)).await.unwrap();
        let before = view.clone();
        let err = access.enroll(&mut view, user_id).await.unwrap_err();

        assert_eq!(err, CoreError::Remote("Payment required".to_string()));
        assert_eq!(view, before);
    }

    #[tokio::test]
    async fn test_mark_complete_updates_set_and_progress() {
        let backend = MemoryBackend::new();
        let (course_id, ids) = seed_course(&backend).await;
        let user_id = Uuid::new_v4();
        let access = CourseAccess::new(backend.backend(Some(user_id)));
        let mut view = access.load_course_view(course_id, Some(user_id)).await.unwrap();
        access.enroll(&mut view, user_id).await.unwrap();

        access.mark_lesson_complete(&mut view, ids[0], user_id).await.unwrap();

        assert_eq!(view.lesson_state(&view.lessons[0]), LessonState::Unlocked(Completion::Completed));
        assert_eq!(view.completed_count(), 1);
        assert_eq!(view.progress_percentage(), 33.0);
    }

    #[tokio::test]
    async fn test_mark_complete_twice_is_a_noop() {
        let backend = MemoryBackend::new();
        let (course_id, ids) = seed_course(&backend).await;
        let user_id = Uuid::new_v4();
        let access = CourseAccess::new(backend.backend(Some(user_id)));
        let mut view = access.load_course_view(course_id, Some(user_id)).await.unwrap();
        access.enroll(&mut view, user_id).await.unwrap();

        access.mark_lesson_complete(&mut view, ids[1], user_id).await.unwrap();
        access.mark_lesson_complete(&mut view, ids[1], user_id).await.unwrap();

        assert_eq!(view.completed.len(), 1);
        let progress_calls = backend
            .function_calls()
            .await
            .into_iter()
            .filter(|c| c == functions::UPDATE_PROGRESS)
            .count();
        assert_eq!(progress_calls, 1);
    }

    #[tokio::test]
    async fn test_mark_complete_without_enrollment_is_forbidden() {
        let backend = MemoryBackend::new();
        let (course_id, ids) = seed_course(&backend).await;
        let user_id = Uuid::new_v4();
        let access = CourseAccess::new(backend.backend(Some(user_id)));
        let mut view = access.load_course_view(course_id, Some(user_id)).await.unwrap();

        let err = access.mark_lesson_complete(&mut view, ids[1], user_id).await.unwrap_err();

        assert_eq!(err, CoreError::Forbidden);
        assert!(view.completed.is_empty());
        assert!(backend.function_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_progress_update_leaves_state_unchanged() {
        let backend = MemoryBackend::new();
        let (course_id, ids) = seed_course(&backend).await;
        let user_id = Uuid::new_v4();
        let access = CourseAccess::new(backend.backend(Some(user_id)));
        let mut view = access.load_course_view(course_id, Some(user_id)).await.unwrap();
        access.enroll(&mut view, user_id).await.unwrap();
        backend.fail_function(functions::UPDATE_PROGRESS, "temporarily unavailable").await;

        assert!(access.mark_lesson_complete(&mut view, ids[0], user_id).await.is_err());
        assert!(view.completed.is_empty());

        backend.clear_failure(functions::UPDATE_PROGRESS).await;
        access.mark_lesson_complete(&mut view, ids[0], user_id).await.unwrap();
        assert!(view.completed.contains(&ids[0]));
    }
}
