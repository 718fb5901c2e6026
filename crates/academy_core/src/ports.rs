//! crates/academy_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the remote backend.
//! These traits form the boundary of the hexagonal architecture: the core logic
//! only ever sees a generic collection store, a set of callable remote functions
//! and an auth provider, never a concrete SDK or HTTP client.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::domain::AuthSession;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint rejected an insert.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The backend answered with an error payload or a non-2xx status.
    #[error("{0}")]
    Remote(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A row as stored by the backend: always a JSON object.
pub type Row = Value;

//=========================================================================================
// Collections and Queries
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Courses,
    Lessons,
    Enrollments,
    LessonProgress,
    Cart,
    Products,
    Orders,
    Profiles,
    Testimonials,
}

impl Collection {
    /// The remote table name.
    pub fn table(self) -> &'static str {
        match self {
            Collection::Courses => "courses",
            Collection::Lessons => "lessons",
            Collection::Enrollments => "enrollments",
            Collection::LessonProgress => "lesson_progress",
            Collection::Cart => "cart",
            Collection::Products => "products",
            Collection::Orders => "orders",
            Collection::Profiles => "profiles",
            Collection::Testimonials => "testimonials",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// An equality filter on a single column. Values travel in their textual form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
        Self {
            column: column.into(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// A select against one collection: equality filters, an optional ordering and limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: Collection,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, SortDirection)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(&self, query: &Query) -> PortResult<Vec<Row>>;

    /// Inserts a row and returns it as stored (with generated columns filled in).
    async fn insert(&self, collection: Collection, row: Row) -> PortResult<Row>;

    /// Applies `patch` to every row matching `filters`; returns the updated rows.
    async fn update(&self, collection: Collection, filters: &[Filter], patch: Row)
        -> PortResult<Vec<Row>>;

    async fn delete(&self, collection: Collection, filters: &[Filter]) -> PortResult<()>;
}

/// Names of the remote functions the platform calls.
pub mod functions {
    pub const CREATE_ORDER: &str = "create-order";
    pub const ENROLL_COURSE: &str = "enroll-course";
    pub const UPDATE_PROGRESS: &str = "update-progress";
}

#[async_trait]
pub trait RemoteFunctions: Send + Sync {
    /// Invokes a named remote function and returns its `data` payload.
    async fn invoke(&self, name: &str, body: Value) -> PortResult<Value>;
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolves an access token to the signed-in user.
    async fn resolve_session(&self, access_token: &str) -> PortResult<AuthSession>;
}

/// The store and function ports bound to one caller's credentials.
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn DataStore>,
    pub functions: Arc<dyn RemoteFunctions>,
}

impl Backend {
    pub fn new(store: Arc<dyn DataStore>, functions: Arc<dyn RemoteFunctions>) -> Self {
        Self { store, functions }
    }
}
