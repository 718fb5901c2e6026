//! crates/academy_core/src/dashboard.rs
//!
//! The signed-in user's overview: enrolled courses with progress, and orders.

use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::domain::{Course, Enrollment, Language, Order, Profile};
use crate::error::CoreResult;
use crate::ports::{Collection, DataStore, Query, SortDirection};
use crate::records::{fetch_all, fetch_optional};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrolledCourse {
    pub course_id: Uuid,
    pub title: String,
    /// Server-computed.
    pub progress_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub profile: Option<Profile>,
    pub courses: Vec<EnrolledCourse>,
    /// Newest first.
    pub orders: Vec<Order>,
}

#[instrument(skip(store))]
pub async fn load_dashboard(store: Arc<dyn DataStore>, user_id: Uuid, language: Language) -> CoreResult<Dashboard> {
    let store = store.as_ref();
    let enrollments_query = Query::new(Collection::Enrollments).eq("user_id", user_id);
    let orders_query = Query::new(Collection::Orders)
        .eq("user_id", user_id)
        .order_by("created_at", SortDirection::Descending);

    let (profile, enrollments, orders) = futures::try_join!(
        fetch_optional::<Profile>(store, Query::new(Collection::Profiles).eq("id", user_id)),
        fetch_all::<Enrollment>(store, &enrollments_query),
        fetch_all::<Order>(store, &orders_query)
    )?;

    let courses = try_join_all(enrollments.iter().map(|e| {
        fetch_optional::<Course>(store, Query::new(Collection::Courses).eq("id", e.course_id))
    }))
    .await?;

    let courses = enrollments
        .iter()
        .zip(courses)
        .filter_map(|(enrollment, course)| match course {
            Some(course) => Some(EnrolledCourse {
                course_id: course.id,
                title: course.title(language).to_string(),
                progress_percentage: enrollment.progress_percentage,
            }),
            None => {
                warn!(course_id = %enrollment.course_id, "Enrollment for a missing course");
                None
            }
        })
        .collect();

    Ok(Dashboard {
        profile,
        courses,
        orders,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use crate::ports::functions;
    use serde_json::json;

    #[tokio::test]
    async fn test_dashboard_lists_enrolled_courses_with_progress() {
        let backend = MemoryBackend::new();
        let seed = backend.seed_demo().await.unwrap();
        let client = backend.backend(Some(seed.student_id));
        client
            .functions
            .invoke(functions::ENROLL_COURSE, json!({ "courseId": seed.course_id }))
            .await
            .unwrap();

        let dashboard = load_dashboard(client.store.clone(), seed.student_id, Language::En)
            .await
            .unwrap();

        assert_eq!(dashboard.courses.len(), 1);
        assert_eq!(dashboard.courses[0].title, "Programming Basics");
        assert_eq!(dashboard.courses[0].progress_percentage, 0.0);
        assert!(dashboard.orders.is_empty());
        assert_eq!(dashboard.profile.unwrap().full_name.as_deref(), Some("Demo Student"));
    }
}
