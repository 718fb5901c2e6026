//! services/gateway/src/web/courses.rs
//!
//! Course catalog and the course page: lesson gating, enrollment and progress.

use academy_core::course_access::{EnrollmentAction, LessonState};
use academy_core::domain::Direction;
use academy_core::{Catalog, CoreError, Course, CourseAccess, CourseView, Language, AuthSession};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::Viewer;
use crate::web::state::{AppState, LangQuery};

//=========================================================================================
// Response Structs
//=========================================================================================

#[derive(Serialize, Debug)]
pub struct LessonEntry {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order_index: i32,
    pub is_preview: bool,
    pub duration_minutes: Option<u32>,
    /// 1-based position within the course.
    pub position: usize,
    pub state: LessonState,
    /// Only present for lessons the viewer may open.
    pub video_url: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct CourseViewResponse {
    pub course: Course,
    pub title: String,
    pub lessons: Vec<LessonEntry>,
    pub selected_lesson_id: Option<Uuid>,
    pub completed_count: usize,
    pub total_lessons: usize,
    pub progress_percentage: f64,
    pub enrollment_action: EnrollmentAction,
    pub direction: Direction,
}

impl CourseViewResponse {
    pub fn from_view(view: &CourseView, language: Language) -> Self {
        let lessons = view
            .lessons
            .iter()
            .enumerate()
            .map(|(i, lesson)| {
                let state = view.lesson_state(lesson);
                let description = match language {
                    Language::Ar => lesson.description_ar.clone(),
                    Language::En => lesson.description_en.clone(),
                };
                LessonEntry {
                    id: lesson.id,
                    title: lesson.title(language).to_string(),
                    description,
                    order_index: lesson.order_index,
                    is_preview: lesson.is_preview,
                    duration_minutes: lesson.duration_minutes,
                    position: i + 1,
                    state,
                    video_url: match state {
                        LessonState::Locked => None,
                        LessonState::Unlocked(_) => lesson.video_url.clone(),
                    },
                }
            })
            .collect();

        Self {
            course: view.course.clone(),
            title: view.course.title(language).to_string(),
            lessons,
            selected_lesson_id: view.selected,
            completed_count: view.completed_count(),
            total_lessons: view.lessons.len(),
            progress_percentage: view.progress_percentage(),
            enrollment_action: view.enrollment_action(),
            direction: language.direction(),
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// List published courses.
#[utoipa::path(
    get,
    path = "/courses",
    responses(
        (status = 200, description = "Published courses, newest first"),
        (status = 502, description = "The backend rejected the request")
    )
)]
pub async fn list_courses_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Course>>, ApiError> {
    let catalog = Catalog::new(state.backend(None).store);
    Ok(Json(catalog.list_published_courses().await?))
}

/// The course page for the current viewer, signed in or not.
#[utoipa::path(
    get,
    path = "/courses/{course_id}",
    params(
        ("course_id" = Uuid, Path, description = "The course to show."),
        LangQuery
    ),
    responses(
        (status = 200, description = "The course view with per-lesson access state"),
        (status = 401, description = "A bearer token was sent but is invalid"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn get_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(Viewer(viewer)): Extension<Viewer>,
    Path(course_id): Path<Uuid>,
    Query(query): Query<LangQuery>,
) -> Result<Json<CourseViewResponse>, ApiError> {
    let language = state.language(query.lang);
    let access = CourseAccess::new(state.backend(viewer.as_ref()));
    let view = access
        .load_course_view(course_id, viewer.as_ref().map(|s| s.user_id))
        .await?;
    Ok(Json(CourseViewResponse::from_view(&view, language)))
}

/// Enroll the signed-in user in a course.
#[utoipa::path(
    post,
    path = "/courses/{course_id}/enroll",
    params(
        ("course_id" = Uuid, Path, description = "The course to enroll in."),
        LangQuery
    ),
    responses(
        (status = 200, description = "Enrolled; the refreshed course view"),
        (status = 401, description = "Not signed in"),
        (status = 409, description = "An enrollment for this course is already in progress"),
        (status = 502, description = "The backend refused the enrollment")
    ),
    security(("bearer" = []))
)]
pub async fn enroll_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(course_id): Path<Uuid>,
    Query(query): Query<LangQuery>,
) -> Result<Json<CourseViewResponse>, ApiError> {
    let _guard = state
        .enroll_in_flight
        .try_acquire((session.user_id, course_id))
        .ok_or(CoreError::Busy)?;
    let language = state.language(query.lang);
    let access = CourseAccess::new(state.backend(Some(&session)));

    let mut view = access.load_course_view(course_id, Some(session.user_id)).await?;
    access.enroll(&mut view, session.user_id).await?;
    info!(user_id = %session.user_id, %course_id, "Enrollment complete");
    Ok(Json(CourseViewResponse::from_view(&view, language)))
}

/// Mark a lesson as completed for the signed-in user.
#[utoipa::path(
    post,
    path = "/courses/{course_id}/lessons/{lesson_id}/complete",
    params(
        ("course_id" = Uuid, Path, description = "The lesson's course."),
        ("lesson_id" = Uuid, Path, description = "The lesson to complete."),
        LangQuery
    ),
    responses(
        (status = 200, description = "The refreshed course view"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not enrolled in the course"),
        (status = 404, description = "Course or lesson not found")
    ),
    security(("bearer" = []))
)]
pub async fn complete_lesson_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<LangQuery>,
) -> Result<Json<CourseViewResponse>, ApiError> {
    let language = state.language(query.lang);
    let access = CourseAccess::new(state.backend(Some(&session)));

    let mut view = access.load_course_view(course_id, Some(session.user_id)).await?;
    access
        .mark_lesson_complete(&mut view, lesson_id, session.user_id)
        .await?;
    Ok(Json(CourseViewResponse::from_view(&view, language)))
}
