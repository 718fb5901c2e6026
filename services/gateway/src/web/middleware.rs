//! services/gateway/src/web/middleware.rs
//!
//! Authentication middleware. The bearer token is resolved through the auth
//! provider on every request.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use academy_core::{AuthSession, CoreError};
use std::sync::Arc;
use tracing::warn;

use crate::error::ApiError;
use crate::web::state::AppState;

/// The caller on routes where signing in is optional.
#[derive(Clone, Debug)]
pub struct Viewer(pub Option<AuthSession>);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn resolve(state: &AppState, token: &str) -> Result<AuthSession, ApiError> {
    state.auth.resolve_session(token).await.map_err(|e| {
        warn!("Failed to resolve session: {}", e);
        ApiError::from(e)
    })
}

/// Rejects requests without a valid session; inserts the `AuthSession` for handlers.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(CoreError::Unauthenticated)?;
    let session = resolve(&state, token).await?;
    req.extensions_mut().insert(Viewer(Some(session.clone())));
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Resolves the session when a token is present. A present but invalid token is still rejected.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = match bearer_token(req.headers()) {
        Some(token) => Some(resolve(&state, token).await?),
        None => None,
    };
    req.extensions_mut().insert(Viewer(session));
    Ok(next.run(req).await)
}
