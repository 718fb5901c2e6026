//! crates/academy_core/src/memory.rs
//!
//! An in-process backend that implements every port. It mirrors the remote
//! store's observable rules: uniqueness constraints reject duplicate inserts,
//! and the three remote functions apply their effects server-side.
//! Used by the tests and by the gateway's `memory` mode.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::domain::AuthSession;
use crate::ports::{
    functions, AuthProvider, Backend, Collection, DataStore, Filter, PortError, PortResult,
    Query, RemoteFunctions, Row, SortDirection,
};

//=========================================================================================
// Shared State
//=========================================================================================

#[derive(Default)]
struct MemoryState {
    tables: HashMap<Collection, Vec<Row>>,
    tokens: HashMap<String, AuthSession>,
    failing_functions: HashMap<String, String>,
    function_calls: Vec<String>,
}

/// Columns that must be unique together, besides `id`.
fn unique_columns(collection: Collection) -> &'static [&'static str] {
    match collection {
        Collection::Cart => &["user_id", "product_id"],
        Collection::Enrollments => &["user_id", "course_id"],
        Collection::LessonProgress => &["user_id", "lesson_id"],
        _ => &[],
    }
}

fn column_text(row: &Row, column: &str) -> Option<String> {
    match row.get(column) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn matches(row: &Row, filters: &[Filter]) -> bool {
    filters
        .iter()
        .all(|f| column_text(row, &f.column).as_deref() == Some(f.value.as_str()))
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        // nulls last
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

impl MemoryState {
    fn table(&mut self, collection: Collection) -> &mut Vec<Row> {
        self.tables.entry(collection).or_default()
    }

    fn select(&self, query: &Query) -> Vec<Row> {
        let mut rows: Vec<Row> = self
            .tables
            .get(&query.collection)
            .map(|rows| rows.iter().filter(|r| matches(r, &query.filters)).cloned().collect())
            .unwrap_or_default();

        if let Some((column, direction)) = &query.order_by {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(column), b.get(column));
                match direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        rows
    }

    fn insert(&mut self, collection: Collection, row: Row) -> PortResult<Row> {
        let Value::Object(mut fields) = row else {
            return Err(PortError::Unexpected(format!(
                "Insert into {} expects a JSON object",
                collection
            )));
        };
        fields
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        fields
            .entry("created_at")
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        let row = Value::Object(fields);

        let id = column_text(&row, "id");
        let unique = unique_columns(collection);
        let table = self.table(collection);
        if table.iter().any(|r| column_text(r, "id") == id) {
            return Err(PortError::Conflict(format!(
                "duplicate key value violates unique constraint \"{}_pkey\"",
                collection
            )));
        }
        if !unique.is_empty()
            && table
                .iter()
                .any(|r| unique.iter().all(|c| column_text(r, c) == column_text(&row, c)))
        {
            return Err(PortError::Conflict(format!(
                "duplicate key value violates unique constraint \"{}_{}_key\"",
                collection,
                unique.join("_")
            )));
        }
        table.push(row.clone());
        Ok(row)
    }

    fn update(&mut self, collection: Collection, filters: &[Filter], patch: Row) -> PortResult<Vec<Row>> {
        let Value::Object(patch) = patch else {
            return Err(PortError::Unexpected(format!(
                "Update of {} expects a JSON object",
                collection
            )));
        };
        let mut updated = Vec::new();
        for row in self.table(collection).iter_mut().filter(|r| matches(r, filters)) {
            if let Value::Object(fields) = row {
                for (key, value) in &patch {
                    fields.insert(key.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    fn delete(&mut self, collection: Collection, filters: &[Filter]) {
        self.table(collection).retain(|r| !matches(r, filters));
    }
}

//=========================================================================================
// The Backend Handle
//=========================================================================================

/// Owns the in-memory tables. Hand out per-user clients with [`MemoryBackend::client`].
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

/// Ids and tokens created by [`MemoryBackend::seed_demo`].
#[derive(Debug, Clone)]
pub struct DemoSeed {
    pub course_id: Uuid,
    pub student_id: Uuid,
    pub student_token: String,
    pub admin_id: Uuid,
    pub admin_token: String,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client acting on behalf of `user_id` (or anonymously).
    pub fn client(&self, user_id: Option<Uuid>) -> MemoryClient {
        MemoryClient {
            state: self.state.clone(),
            user_id,
        }
    }

    pub fn backend(&self, user_id: Option<Uuid>) -> Backend {
        let client = Arc::new(self.client(user_id));
        Backend::new(client.clone(), client)
    }

    /// Inserts a row directly, bypassing any caller identity.
    pub async fn seed(&self, collection: Collection, row: Row) -> PortResult<Row> {
        self.state.lock().await.insert(collection, row)
    }

    pub async fn rows(&self, collection: Collection) -> Vec<Row> {
        self.state.lock().await.select(&Query::new(collection))
    }

    /// Makes every call to the named function fail with `message` until cleared.
    pub async fn fail_function(&self, name: &str, message: &str) {
        self.state
            .lock()
            .await
            .failing_functions
            .insert(name.to_string(), message.to_string());
    }

    pub async fn clear_failure(&self, name: &str) {
        self.state.lock().await.failing_functions.remove(name);
    }

    /// Names of the remote functions invoked so far, in call order.
    pub async fn function_calls(&self) -> Vec<String> {
        self.state.lock().await.function_calls.clone()
    }

    pub async fn issue_token(&self, user_id: Uuid, email: Option<&str>) -> String {
        let token = format!("mem-{}", Uuid::new_v4().simple());
        let session = AuthSession {
            user_id,
            email: email.map(str::to_string),
            access_token: token.clone(),
        };
        self.state.lock().await.tokens.insert(token.clone(), session);
        token
    }

    /// Fills the store with a small catalog, a student and an admin.
    pub async fn seed_demo(&self) -> PortResult<DemoSeed> {
        let course_id = Uuid::new_v4();
        self.seed(
            Collection::Courses,
            json!({
                "id": course_id,
                "title_ar": "أساسيات البرمجة",
                "title_en": "Programming Basics",
                "price": 4500.0,
                "is_free": false,
                "duration_hours": 6.5,
                "level": "beginner",
                "is_published": true,
            }),
        )
        .await?;
        for (index, preview) in [(1, false), (2, true), (3, false)] {
            self.seed(
                Collection::Lessons,
                json!({
                    "course_id": course_id,
                    "title_ar": format!("الدرس {}", index),
                    "title_en": format!("Lesson {}", index),
                    "order_index": index,
                    "is_preview": preview,
                    "video_url": format!("https://videos.example.com/programming-basics/{}.mp4", index),
                    "duration_minutes": 12,
                }),
            )
            .await?;
        }
        for (name_ar, name_en, price) in [("كتاب الحساب", "Arithmetic Workbook", 500.0), ("حقيبة مدرسية", "School Bag", 300.0)] {
            self.seed(
                Collection::Products,
                json!({
                    "name_ar": name_ar,
                    "name_en": name_en,
                    "price": price,
                    "stock_quantity": 25,
                    "target_audience": "students",
                    "is_active": true,
                }),
            )
            .await?;
        }
        self.seed(
            Collection::Testimonials,
            json!({
                "author_name": "Amina",
                "content_ar": "دروس واضحة ومفيدة",
                "content_en": "Clear and useful lessons",
                "rating": 5,
            }),
        )
        .await?;

        let student_id = Uuid::new_v4();
        let admin_id = Uuid::new_v4();
        self.seed(
            Collection::Profiles,
            json!({ "id": student_id, "full_name": "Demo Student", "role": "student", "preferred_language": "ar" }),
        )
        .await?;
        self.seed(
            Collection::Profiles,
            json!({ "id": admin_id, "full_name": "Demo Admin", "role": "admin", "preferred_language": "en" }),
        )
        .await?;

        Ok(DemoSeed {
            course_id,
            student_id,
            student_token: self.issue_token(student_id, Some("student@example.com")).await,
            admin_id,
            admin_token: self.issue_token(admin_id, Some("admin@example.com")).await,
        })
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn resolve_session(&self, access_token: &str) -> PortResult<AuthSession> {
        self.state
            .lock()
            .await
            .tokens
            .get(access_token)
            .cloned()
            .ok_or(PortError::Unauthorized)
    }
}

//=========================================================================================
// Per-caller Client
//=========================================================================================

/// The store and function ports bound to one caller.
#[derive(Clone)]
pub struct MemoryClient {
    state: Arc<Mutex<MemoryState>>,
    user_id: Option<Uuid>,
}

#[async_trait]
impl DataStore for MemoryClient {
    async fn select(&self, query: &Query) -> PortResult<Vec<Row>> {
        Ok(self.state.lock().await.select(query))
    }

    async fn insert(&self, collection: Collection, row: Row) -> PortResult<Row> {
        self.state.lock().await.insert(collection, row)
    }

    async fn update(&self, collection: Collection, filters: &[Filter], patch: Row) -> PortResult<Vec<Row>> {
        self.state.lock().await.update(collection, filters, patch)
    }

    async fn delete(&self, collection: Collection, filters: &[Filter]) -> PortResult<()> {
        self.state.lock().await.delete(collection, filters);
        Ok(())
    }
}

fn uuid_field(body: &Value, key: &str) -> PortResult<Uuid> {
    body.get(key)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| PortError::Remote(format!("{} is required", key)))
}

#[async_trait]
impl RemoteFunctions for MemoryClient {
    async fn invoke(&self, name: &str, body: Value) -> PortResult<Value> {
        let mut state = self.state.lock().await;
        state.function_calls.push(name.to_string());
        if let Some(message) = state.failing_functions.get(name) {
            return Err(PortError::Remote(message.clone()));
        }
        let user_id = self.user_id.ok_or(PortError::Unauthorized)?;
        debug!(function = name, %user_id, "Invoking in-memory function");

        match name {
            functions::ENROLL_COURSE => enroll_course(&mut state, user_id, &body),
            functions::UPDATE_PROGRESS => update_progress(&mut state, user_id, &body),
            functions::CREATE_ORDER => create_order(&mut state, user_id, &body),
            other => Err(PortError::Remote(format!("Function {} not found", other))),
        }
    }
}

fn enroll_course(state: &mut MemoryState, user_id: Uuid, body: &Value) -> PortResult<Value> {
    let course_id = uuid_field(body, "courseId")?;
    if state.select(&Query::new(Collection::Courses).eq("id", course_id)).is_empty() {
        return Err(PortError::Remote("Course not found".to_string()));
    }
    let existing = state.select(
        &Query::new(Collection::Enrollments)
            .eq("user_id", user_id)
            .eq("course_id", course_id),
    );
    if let Some(enrollment) = existing.into_iter().next() {
        return Ok(enrollment);
    }
    state.insert(
        Collection::Enrollments,
        json!({
            "user_id": user_id,
            "course_id": course_id,
            "progress_percentage": 0.0,
            "enrolled_at": Utc::now().to_rfc3339(),
        }),
    )
}

fn update_progress(state: &mut MemoryState, user_id: Uuid, body: &Value) -> PortResult<Value> {
    let lesson_id = uuid_field(body, "lessonId")?;
    let course_id = uuid_field(body, "courseId")?;
    let completed = body.get("completed").and_then(Value::as_bool).unwrap_or(true);

    let enrollment_filters = [Filter::eq("user_id", user_id), Filter::eq("course_id", course_id)];
    if state
        .select(&Query { filters: enrollment_filters.to_vec(), ..Query::new(Collection::Enrollments) })
        .is_empty()
    {
        return Err(PortError::Remote("Not enrolled in this course".to_string()));
    }

    let progress_filters = [Filter::eq("user_id", user_id), Filter::eq("lesson_id", lesson_id)];
    let updated = state.update(
        Collection::LessonProgress,
        &progress_filters,
        json!({ "completed": completed }),
    )?;
    if updated.is_empty() {
        state.insert(
            Collection::LessonProgress,
            json!({
                "user_id": user_id,
                "course_id": course_id,
                "lesson_id": lesson_id,
                "completed": completed,
            }),
        )?;
    }

    let total = state
        .select(&Query::new(Collection::Lessons).eq("course_id", course_id))
        .len();
    let done = state
        .select(
            &Query::new(Collection::LessonProgress)
                .eq("user_id", user_id)
                .eq("course_id", course_id)
                .eq("completed", true),
        )
        .len();
    let percentage = if total == 0 {
        0.0
    } else {
        ((done as f64 / total as f64) * 100.0).round()
    };
    state.update(
        Collection::Enrollments,
        &enrollment_filters,
        json!({ "progress_percentage": percentage }),
    )?;
    Ok(json!({ "progress_percentage": percentage }))
}

fn create_order(state: &mut MemoryState, user_id: Uuid, body: &Value) -> PortResult<Value> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
        .ok_or_else(|| PortError::Remote("Order has no items".to_string()))?;
    let subtotal: f64 = items
        .iter()
        .map(|item| {
            let price = item.get("unitPriceAtOrderTime").and_then(Value::as_f64).unwrap_or(0.0);
            let quantity = item.get("quantity").and_then(Value::as_f64).unwrap_or(0.0);
            price * quantity
        })
        .sum();
    let shipping = body.get("shippingCost").and_then(Value::as_f64).unwrap_or(0.0);

    let mut order = Map::new();
    order.insert("user_id".into(), json!(user_id));
    order.insert("total_amount".into(), json!(subtotal + shipping));
    order.insert("status".into(), json!("pending"));
    for (from, to) in [
        ("paymentMethod", "payment_method"),
        ("shippingAddress", "shipping_address"),
        ("currency", "currency"),
        ("notes", "notes"),
        ("items", "items"),
    ] {
        order.insert(to.into(), body.get(from).cloned().unwrap_or(Value::Null));
    }
    let order = state.insert(Collection::Orders, Value::Object(order))?;
    state.delete(Collection::Cart, &[Filter::eq("user_id", user_id)]);
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cart_uniqueness_is_enforced() {
        let backend = MemoryBackend::new();
        let client = backend.client(None);
        let row = json!({ "user_id": "u1", "product_id": "p1", "quantity": 1 });

        client.insert(Collection::Cart, row.clone()).await.unwrap();
        let err = client.insert(Collection::Cart, row).await.unwrap_err();

        assert!(matches!(err, PortError::Conflict(_)));
        assert_eq!(backend.rows(Collection::Cart).await.len(), 1);
    }

    #[tokio::test]
    async fn test_select_filters_orders_and_limits() {
        let backend = MemoryBackend::new();
        for index in [3, 1, 2] {
            backend
                .seed(Collection::Lessons, json!({ "course_id": "c1", "order_index": index }))
                .await
                .unwrap();
        }
        backend
            .seed(Collection::Lessons, json!({ "course_id": "c2", "order_index": 0 }))
            .await
            .unwrap();

        let query = Query::new(Collection::Lessons)
            .eq("course_id", "c1")
            .order_by("order_index", SortDirection::Ascending)
            .limit(2);
        let rows = backend.client(None).select(&query).await.unwrap();

        let indices: Vec<i64> = rows.iter().map(|r| r["order_index"].as_i64().unwrap()).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_functions_require_a_caller() {
        let backend = MemoryBackend::new();
        let err = backend
            .client(None)
            .invoke(functions::ENROLL_COURSE, json!({ "courseId": Uuid::new_v4() }))
            .await
            .unwrap_err();
        assert_eq!(err, PortError::Unauthorized);
    }

    #[tokio::test]
    async fn test_issued_tokens_resolve_to_their_user() {
        let backend = MemoryBackend::new();
        let user_id = Uuid::new_v4();
        let token = backend.issue_token(user_id, None).await;

        assert_eq!(backend.resolve_session(&token).await.unwrap().user_id, user_id);
        assert_eq!(
            backend.resolve_session("bogus").await.unwrap_err(),
            PortError::Unauthorized
        );
    }
}
