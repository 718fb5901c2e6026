//! services/gateway/src/web/account.rs
//!
//! The user dashboard, language preference and translation tables.

use academy_core::{load_dashboard, AuthSession, CoreError, Dashboard, Language, Locale, LocaleContext};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::state::{AppState, LangQuery};

#[derive(Deserialize, ToSchema)]
pub struct LanguageRequest {
    #[schema(value_type = String, example = "ar")]
    pub language: Language,
}

/// The signed-in user's enrolled courses and orders.
#[utoipa::path(
    get,
    path = "/dashboard",
    params(LangQuery),
    responses(
        (status = 200, description = "Enrollments with progress and orders, newest first"),
        (status = 401, description = "Not signed in")
    ),
    security(("bearer" = []))
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Query(query): Query<LangQuery>,
) -> Result<Json<Dashboard>, ApiError> {
    let store = state.backend(Some(&session)).store;
    let dashboard = load_dashboard(store, session.user_id, state.language(query.lang)).await?;
    Ok(Json(dashboard))
}

/// Save the user's preferred language.
#[utoipa::path(
    put,
    path = "/me/language",
    request_body = LanguageRequest,
    responses(
        (status = 200, description = "The stored language and its text direction"),
        (status = 401, description = "Not signed in")
    ),
    security(("bearer" = []))
)]
pub async fn set_language_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthSession>,
    Json(req): Json<LanguageRequest>,
) -> Result<Json<Locale>, ApiError> {
    let locale = LocaleContext::new(req.language);
    let backend = state.backend(Some(&session));
    locale
        .persist_language(backend.store.as_ref(), session.user_id)
        .await?;
    Ok(Json(locale.current()))
}

/// The translation table for one language, keyed by dotted identifiers.
#[utoipa::path(
    get,
    path = "/i18n/{lang}",
    params(("lang" = String, Path, description = "ar or en")),
    responses(
        (status = 200, description = "Dotted key to translated string"),
        (status = 404, description = "Unsupported language")
    )
)]
pub async fn translations_handler(
    State(state): State<Arc<AppState>>,
    Path(lang): Path<String>,
) -> Result<Json<BTreeMap<&'static str, &'static str>>, ApiError> {
    let language = lang
        .parse::<Language>()
        .map_err(|_| ApiError::from(CoreError::NotFound(format!("language {}", lang))))?;
    Ok(Json(state.translator.table(language)))
}
