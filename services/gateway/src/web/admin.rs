//! services/gateway/src/web/admin.rs
//!
//! Back-office routes. Every request re-reads the caller's profile through
//! `AdminGate::verify`; no admin flag is cached in the session.

use academy_core::{AdminGate, AuthSession, Order};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

/// All orders, newest first.
#[utoipa::path(
    get,
    path = "/admin/orders",
    responses(
        (status = 200, description = "Every order"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "The caller is not an admin")
    ),
    security(("bearer" = []))
)]
pub async fn list_orders_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let gate = AdminGate::new(state.backend(Some(&session)).store);
    let admin = gate.verify(session.user_id).await?;
    Ok(Json(admin.list_orders().await?))
}

/// Move an order to its next status (pending -> processing -> delivered).
#[utoipa::path(
    post,
    path = "/admin/orders/{order_id}/advance",
    params(("order_id" = Uuid, Path, description = "The order to advance.")),
    responses(
        (status = 200, description = "The updated order"),
        (status = 403, description = "The caller is not an admin"),
        (status = 404, description = "Order not found"),
        (status = 502, description = "The order is already delivered")
    ),
    security(("bearer" = []))
)]
pub async fn advance_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let gate = AdminGate::new(state.backend(Some(&session)).store);
    let admin = gate.verify(session.user_id).await?;
    Ok(Json(admin.advance_order_status(order_id).await?))
}
