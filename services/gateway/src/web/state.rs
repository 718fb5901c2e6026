//! services/gateway/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::Connector;
use crate::config::Config;
use academy_core::{AuthProvider, AuthSession, Backend, InFlight, Language, LocaleContext, Translator};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub connector: Arc<dyn Connector>,
    pub auth: Arc<dyn AuthProvider>,
    pub config: Arc<Config>,
    /// The default interface language for requests that do not name one.
    pub locale: LocaleContext,
    pub translator: Translator,
    /// One checkout per user at a time.
    pub checkout_in_flight: InFlight<Uuid>,
    /// One enrollment per (user, course) at a time.
    pub enroll_in_flight: InFlight<(Uuid, Uuid)>,
}

impl AppState {
    pub fn new(connector: Arc<dyn Connector>, auth: Arc<dyn AuthProvider>, config: Arc<Config>) -> Self {
        Self {
            connector,
            auth,
            locale: LocaleContext::new(config.default_language),
            config,
            translator: Translator::new(),
            checkout_in_flight: InFlight::new(),
            enroll_in_flight: InFlight::new(),
        }
    }

    /// The backend ports bound to the caller's credentials (or anonymous).
    pub fn backend(&self, session: Option<&AuthSession>) -> Backend {
        self.connector.connect(session)
    }

    pub fn language(&self, requested: Option<Language>) -> Language {
        requested.unwrap_or_else(|| self.locale.current().language)
    }
}

/// `?lang=ar|en` on any localized route.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct LangQuery {
    #[param(value_type = Option<String>)]
    pub lang: Option<Language>,
}
