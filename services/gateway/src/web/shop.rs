//! services/gateway/src/web/shop.rs
//!
//! Product listing, the cart and checkout. Every cart mutation answers with a
//! freshly reloaded cart rather than a locally patched one.

use academy_core::checkout::CheckoutOutcome;
use academy_core::{
    AuthSession, Cart, CartView, Catalog, Checkout, CheckoutForm, CoreError, Product, Testimonial,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::{AppState, LangQuery};

//=========================================================================================
// Request Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

//=========================================================================================
// Catalog Handlers
//=========================================================================================

/// List active products.
#[utoipa::path(
    get,
    path = "/products",
    responses((status = 200, description = "Active products"))
)]
pub async fn list_products_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let catalog = Catalog::new(state.backend(None).store);
    Ok(Json(catalog.list_active_products().await?))
}

/// List testimonials shown on the marketing pages.
#[utoipa::path(
    get,
    path = "/testimonials",
    responses((status = 200, description = "Testimonials"))
)]
pub async fn list_testimonials_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Testimonial>>, ApiError> {
    let catalog = Catalog::new(state.backend(None).store);
    Ok(Json(catalog.list_testimonials().await?))
}

//=========================================================================================
// Cart Handlers
//=========================================================================================

/// Fails with `Forbidden` unless the cart row belongs to the caller.
async fn ensure_owner(cart: &Cart, item_id: Uuid, session: &AuthSession) -> Result<(), ApiError> {
    let item = cart.get_item(item_id).await?;
    if item.user_id != session.user_id {
        return Err(CoreError::Forbidden.into());
    }
    Ok(())
}

/// The signed-in user's cart with totals.
#[utoipa::path(
    get,
    path = "/cart",
    params(LangQuery),
    responses(
        (status = 200, description = "Cart lines, subtotal, shipping and total"),
        (status = 401, description = "Not signed in")
    ),
    security(("bearer" = []))
)]
pub async fn get_cart_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<LangQuery>,
) -> Result<Json<CartView>, ApiError> {
    let cart = Cart::new(state.backend(Some(&session)).store);
    let view = cart
        .load_cart(session.user_id, state.language(query.lang))
        .await?;
    Ok(Json(view))
}

/// Add one unit of a product to the cart.
#[utoipa::path(
    post,
    path = "/cart/items",
    params(LangQuery),
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "The reloaded cart"),
        (status = 401, description = "Not signed in")
    ),
    security(("bearer" = []))
)]
pub async fn add_cart_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<LangQuery>,
    Json(req): Json<AddToCartRequest>,
) -> Result<Json<CartView>, ApiError> {
    let cart = Cart::new(state.backend(Some(&session)).store);
    cart.add_to_cart(session.user_id, req.product_id).await?;
    let view = cart
        .load_cart(session.user_id, state.language(query.lang))
        .await?;
    Ok(Json(view))
}

/// Set the quantity of a cart line. Quantities below 1 are rejected.
#[utoipa::path(
    patch,
    path = "/cart/items/{item_id}",
    params(
        ("item_id" = Uuid, Path, description = "The cart line to change."),
        LangQuery
    ),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "The reloaded cart"),
        (status = 400, description = "Quantity below 1"),
        (status = 403, description = "The cart line belongs to someone else")
    ),
    security(("bearer" = []))
)]
pub async fn update_cart_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<LangQuery>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<CartView>, ApiError> {
    let cart = Cart::new(state.backend(Some(&session)).store);
    ensure_owner(&cart, item_id, &session).await?;
    cart.update_quantity(item_id, req.quantity).await?;
    let view = cart
        .load_cart(session.user_id, state.language(query.lang))
        .await?;
    Ok(Json(view))
}

/// Remove a line from the cart.
#[utoipa::path(
    delete,
    path = "/cart/items/{item_id}",
    params(
        ("item_id" = Uuid, Path, description = "The cart line to remove."),
        LangQuery
    ),
    responses(
        (status = 200, description = "The reloaded cart"),
        (status = 403, description = "The cart line belongs to someone else")
    ),
    security(("bearer" = []))
)]
pub async fn delete_cart_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<LangQuery>,
) -> Result<Json<CartView>, ApiError> {
    let cart = Cart::new(state.backend(Some(&session)).store);
    ensure_owner(&cart, item_id, &session).await?;
    cart.remove_from_cart(item_id).await?;
    let view = cart
        .load_cart(session.user_id, state.language(query.lang))
        .await?;
    Ok(Json(view))
}

//=========================================================================================
// Checkout
//=========================================================================================

/// Place an order from the current cart.
#[utoipa::path(
    post,
    path = "/checkout",
    params(LangQuery),
    request_body(
        content_type = "application/json",
        description = "shippingAddress {fullName, phone, address, city, region}, paymentMethod (postal | cod), postalDetails {ripNumber, ccpNumber}"
    ),
    responses(
        (status = 201, description = "Order created; the cart is now empty"),
        (status = 400, description = "Missing shipping field, postal reference or empty cart"),
        (status = 409, description = "A checkout is already in progress"),
        (status = 502, description = "The backend refused the order; the cart is unchanged")
    ),
    security(("bearer" = []))
)]
pub async fn checkout_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<LangQuery>,
    Json(form): Json<CheckoutForm>,
) -> Result<(StatusCode, Json<CheckoutOutcome>), ApiError> {
    let checkout = Checkout::new(state.backend(Some(&session)), state.checkout_in_flight.clone());
    let outcome = checkout
        .submit_checkout(session.user_id, &form, state.language(query.lang))
        .await?;
    info!(user_id = %session.user_id, "Checkout complete");
    Ok((StatusCode::CREATED, Json(outcome)))
}
