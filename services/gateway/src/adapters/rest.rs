//! services/gateway/src/adapters/rest.rs
//!
//! The adapter for the hosted backend-as-a-service. It implements the
//! `DataStore`, `RemoteFunctions` and `AuthProvider` ports from the core crate
//! over the backend's HTTP interface:
//!
//! - collections under `/rest/v1/{table}` with `column=eq.value` filters,
//! - callable functions under `/functions/v1/{name}`,
//! - the auth user endpoint at `/auth/v1/user`.

use academy_core::ports::{
    AuthProvider, Collection, DataStore, Filter, PortError, PortResult, Query, RemoteFunctions,
    Row, SortDirection,
};
use academy_core::AuthSession;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An HTTP client for the remote backend, optionally bound to a user's access token.
#[derive(Clone)]
pub struct RestBackend {
    http: Client,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
}

impl RestBackend {
    /// Creates a new anonymous `RestBackend`.
    pub fn new(http: Client, base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            anon_key: anon_key.into(),
            access_token: None,
        }
    }

    /// A copy of this client that acts with the given user's token.
    pub fn with_token(&self, access_token: &str) -> Self {
        Self {
            access_token: Some(access_token.to_string()),
            ..self.clone()
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn table_url(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection.table())
    }
}

//=========================================================================================
// Request and Response Helpers
//=========================================================================================

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| (f.column.clone(), format!("eq.{}", f.value)))
        .collect()
}

/// Query-string parameters for a select.
pub fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(filter_params(&query.filters));
    if let Some((column, direction)) = &query.order_by {
        let direction = match direction {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        };
        params.push(("order".to_string(), format!("{}.{}", column, direction)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

/// The error body shapes the backend produces.
#[derive(Deserialize, Default)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    error: Option<String>,
    msg: Option<String>,
}

const UNIQUE_VIOLATION: &str = "23505";

/// Maps a failed response onto a `PortError`, keeping the backend's message.
pub fn map_error(status: StatusCode, body: &str) -> PortError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .or(parsed.error)
        .or(parsed.msg)
        .unwrap_or_else(|| format!("Backend responded with {}", status));

    if status == StatusCode::CONFLICT || parsed.code.as_deref() == Some(UNIQUE_VIOLATION) {
        return PortError::Conflict(message);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized,
        StatusCode::NOT_FOUND => PortError::NotFound(message),
        _ => PortError::Remote(message),
    }
}

async fn read_json(response: Response) -> PortResult<Value> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
    if !status.is_success() {
        return Err(map_error(status, &text));
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| PortError::Unexpected(e.to_string()))
}

fn into_rows(value: Value) -> Vec<Row> {
    match value {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Unwraps a function response: `{error}` fails, `{data}` yields the data.
pub fn unwrap_function_payload(value: Value) -> PortResult<Value> {
    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let message = error
            .as_str()
            .map(str::to_string)
            .or_else(|| error.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| error.to_string());
        return Err(PortError::Remote(message));
    }
    match value {
        Value::Object(mut fields) if fields.contains_key("data") => {
            Ok(fields.remove("data").unwrap_or(Value::Null))
        }
        other => Ok(other),
    }
}

fn transport(e: reqwest::Error) -> PortError {
    PortError::Remote(e.to_string())
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl DataStore for RestBackend {
    async fn select(&self, query: &Query) -> PortResult<Vec<Row>> {
        debug!(table = query.collection.table(), "select");
        let request = self
            .http
            .get(self.table_url(query.collection))
            .query(&query_params(query));
        let response = self.authorize(request).send().await.map_err(transport)?;
        Ok(into_rows(read_json(response).await?))
    }

    async fn insert(&self, collection: Collection, row: Row) -> PortResult<Row> {
        debug!(table = collection.table(), "insert");
        let request = self
            .http
            .post(self.table_url(collection))
            .header("Prefer", "return=representation")
            .json(&row);
        let response = self.authorize(request).send().await.map_err(transport)?;
        into_rows(read_json(response).await?)
            .into_iter()
            .next()
            .ok_or_else(|| PortError::Unexpected(format!("Insert into {} returned no row", collection)))
    }

    async fn update(&self, collection: Collection, filters: &[Filter], patch: Row) -> PortResult<Vec<Row>> {
        debug!(table = collection.table(), "update");
        let request = self
            .http
            .patch(self.table_url(collection))
            .query(&filter_params(filters))
            .header("Prefer", "return=representation")
            .json(&patch);
        let response = self.authorize(request).send().await.map_err(transport)?;
        Ok(into_rows(read_json(response).await?))
    }

    async fn delete(&self, collection: Collection, filters: &[Filter]) -> PortResult<()> {
        debug!(table = collection.table(), "delete");
        let request = self
            .http
            .delete(self.table_url(collection))
            .query(&filter_params(filters));
        let response = self.authorize(request).send().await.map_err(transport)?;
        read_json(response).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteFunctions for RestBackend {
    async fn invoke(&self, name: &str, body: Value) -> PortResult<Value> {
        debug!(function = name, "invoke");
        let request = self
            .http
            .post(format!("{}/functions/v1/{}", self.base_url, name))
            .json(&body);
        let response = self.authorize(request).send().await.map_err(transport)?;
        unwrap_function_payload(read_json(response).await?)
    }
}

#[derive(Deserialize)]
struct AuthUser {
    id: Uuid,
    email: Option<String>,
}

#[async_trait]
impl AuthProvider for RestBackend {
    async fn resolve_session(&self, access_token: &str) -> PortResult<AuthSession> {
        let request = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);
        let response = request.send().await.map_err(transport)?;
        let user: AuthUser = serde_json::from_value(read_json(response).await?)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(AuthSession {
            user_id: user.id,
            email: user.email,
            access_token: access_token.to_string(),
        })
    }
}
