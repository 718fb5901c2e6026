//! services/gateway/src/web/mod.rs
//!
//! Route table and the master definition for the OpenAPI specification.

pub mod account;
pub mod admin;
pub mod courses;
pub mod middleware;
pub mod shop;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use self::middleware::{optional_auth, require_auth};
use self::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        courses::list_courses_handler,
        courses::get_course_handler,
        courses::enroll_handler,
        courses::complete_lesson_handler,
        shop::list_products_handler,
        shop::list_testimonials_handler,
        shop::get_cart_handler,
        shop::add_cart_item_handler,
        shop::update_cart_item_handler,
        shop::delete_cart_item_handler,
        shop::checkout_handler,
        account::dashboard_handler,
        account::set_language_handler,
        account::translations_handler,
        admin::list_orders_handler,
        admin::advance_order_handler,
    ),
    components(
        schemas(shop::AddToCartRequest, shop::UpdateQuantityRequest, account::LanguageRequest)
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Academy Gateway", description = "Course catalog, lessons, cart and checkout for the academy web client.")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

//=========================================================================================
// Router
//=========================================================================================

pub fn build_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/courses", get(courses::list_courses_handler))
        .route("/products", get(shop::list_products_handler))
        .route("/testimonials", get(shop::list_testimonials_handler))
        .route("/i18n/{lang}", get(account::translations_handler));

    // Routes that adapt to a signed-in viewer
    let viewer_routes = Router::new()
        .route("/courses/{course_id}", get(courses::get_course_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            optional_auth,
        ));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/courses/{course_id}/enroll", post(courses::enroll_handler))
        .route(
            "/courses/{course_id}/lessons/{lesson_id}/complete",
            post(courses::complete_lesson_handler),
        )
        .route("/cart", get(shop::get_cart_handler))
        .route("/cart/items", post(shop::add_cart_item_handler))
        .route(
            "/cart/items/{item_id}",
            patch(shop::update_cart_item_handler).delete(shop::delete_cart_item_handler),
        )
        .route("/checkout", post(shop::checkout_handler))
        .route("/dashboard", get(account::dashboard_handler))
        .route("/me/language", put(account::set_language_handler))
        .route("/admin/orders", get(admin::list_orders_handler))
        .route("/admin/orders/{order_id}/advance", post(admin::advance_order_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(viewer_routes)
        .merge(protected_routes)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use academy_core::memory::{DemoSeed, MemoryBackend};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app_with_state() -> (Router, Arc<AppState>, MemoryBackend, DemoSeed) {
        let backend = MemoryBackend::new();
        let seed = backend.seed_demo().await.unwrap();
        let config = Config::from_lookup(|key| (key == "BACKEND_MODE").then(|| "memory".to_string())).unwrap();
        let state = Arc::new(AppState::new(Arc::new(backend.clone()), Arc::new(backend.clone()), Arc::new(config)));
        (build_router(state.clone()), state, backend, seed)
    }

    async fn app() -> (Router, MemoryBackend, DemoSeed) {
        let (router, _, backend, seed) = app_with_state().await;
        (router, backend, seed)
    }

    async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn address() -> Value {
        json!({
            "fullName": "Demo Student",
            "phone": "0555 00 00 00",
            "address": "1 Rue Larbi Ben M'hidi",
            "city": "Oran",
            "region": "Oran",
        })
    }

    #[tokio::test]
    async fn test_anonymous_course_page_gates_lessons() {
        let (app, _, seed) = app().await;

        let (status, body) = call(&app, "GET", &format!("/courses/{}?lang=en", seed.course_id), None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Programming Basics");
        assert_eq!(body["direction"], "ltr");
        assert_eq!(body["enrollment_action"], "sign_in_to_enroll");
        let lessons = body["lessons"].as_array().unwrap();
        assert_eq!(lessons[0]["state"]["access"], "locked");
        assert_eq!(lessons[1]["state"]["access"], "unlocked");
        assert_eq!(lessons[2]["state"]["access"], "locked");
        assert_eq!(body["selected_lesson_id"], lessons[1]["id"]);
        assert!(lessons[0]["video_url"].is_null());
        assert!(lessons[1]["video_url"].is_string());
        assert!(lessons[2]["video_url"].is_null());
    }

    #[tokio::test]
    async fn test_concurrent_enrollment_is_rejected() {
        let (app, state, backend, seed) = app_with_state().await;
        let _held = state
            .enroll_in_flight
            .try_acquire((seed.student_id, seed.course_id))
            .unwrap();

        let uri = format!("/courses/{}/enroll", seed.course_id);
        let (status, body) = call(&app, "POST", &uri, Some(&seed.student_token), None).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["key"], "errors.busy");
        assert!(backend.function_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_course_is_404_and_bad_token_is_401() {
        let (app, _, seed) = app().await;

        let (status, body) = call(&app, "GET", &format!("/courses/{}", uuid::Uuid::new_v4()), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["key"], "errors.not_found");

        let (status, _) = call(&app, "GET", &format!("/courses/{}", seed.course_id), Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_enroll_then_complete_lesson() {
        let (app, _, seed) = app().await;
        let token = Some(seed.student_token.as_str());

        let (status, body) = call(&app, "POST", &format!("/courses/{}/enroll", seed.course_id), token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enrollment_action"], "enrolled");
        let first = body["lessons"][0]["id"].as_str().unwrap().to_string();

        let uri = format!("/courses/{}/lessons/{}/complete", seed.course_id, first);
        let (status, body) = call(&app, "POST", &uri, token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["completed_count"], 1);
        assert_eq!(body["lessons"][0]["state"]["completion"], "completed");
    }

    #[tokio::test]
    async fn test_cart_requires_sign_in() {
        let (app, _, _) = app().await;
        let (status, body) = call(&app, "POST", "/cart/items", None, Some(json!({ "product_id": uuid::Uuid::new_v4() }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["key"], "errors.unauthenticated");
    }

    #[tokio::test]
    async fn test_shopping_and_checkout_flow() {
        let (app, backend, seed) = app().await;
        let token = Some(seed.student_token.as_str());

        let (_, products) = call(&app, "GET", "/products", None, None).await;
        let id_with_price = |price: f64| {
            products
                .as_array()
                .unwrap()
                .iter()
                .find(|p| p["price"] == price)
                .map(|p| p["id"].clone())
                .unwrap()
        };
        let (a, b) = (id_with_price(500.0), id_with_price(300.0));
        for product_id in [&a, &b, &b] {
            let (status, _) = call(&app, "POST", "/cart/items", token, Some(json!({ "product_id": product_id }))).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, cart) = call(&app, "GET", "/cart", token, None).await;
        assert_eq!(cart["items"].as_array().unwrap().len(), 2);
        assert_eq!(cart["subtotal"], 1100.0);
        assert_eq!(cart["total"], 1600.0);

        let line_id = cart["items"][0]["id"].as_str().unwrap().to_string();
        let (status, _) = call(&app, "PATCH", &format!("/cart/items/{}", line_id), token, Some(json!({ "quantity": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut incomplete = address();
        incomplete["city"] = json!("");
        let form = json!({ "shippingAddress": incomplete, "paymentMethod": "cod" });
        let (status, body) = call(&app, "POST", "/checkout", token, Some(form)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["key"], "checkout.errors.missing_field");
        assert!(!backend.function_calls().await.iter().any(|c| c == "create-order"));

        let form = json!({
            "shippingAddress": address(),
            "paymentMethod": "postal",
            "postalDetails": { "ripNumber": "00799999001234567890" },
        });
        let (status, body) = call(&app, "POST", "/checkout", token, Some(form)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["key"], "checkout.errors.missing_postal_reference");

        let form = json!({ "shippingAddress": { "fullName": "Demo Student" }, "paymentMethod": "cod" });
        let (status, body) = call(&app, "POST", "/checkout", token, Some(form)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["key"], "checkout.errors.missing_field");
        assert!(!backend.function_calls().await.iter().any(|c| c == "create-order"));

        let form = json!({ "shippingAddress": address(), "paymentMethod": "cod" });
        let (status, body) = call(&app, "POST", "/checkout", token, Some(form)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["order"]["total_amount"], 1600.0);
        assert!(body["cart"]["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_admin_routes_check_role() {
        let (app, _, seed) = app().await;

        let (status, _) = call(&app, "GET", "/admin/orders", Some(&seed.student_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(&app, "GET", "/admin/orders", Some(&seed.admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_translations_and_language_preference() {
        let (app, _, seed) = app().await;

        let (status, table) = call(&app, "GET", "/i18n/en", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(table["cart.empty"], "Your cart is empty");

        let (status, locale) = call(&app, "PUT", "/me/language", Some(&seed.student_token), Some(json!({ "language": "en" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(locale["direction"], "ltr");
    }
}
