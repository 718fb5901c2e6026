//! crates/academy_core/src/context.rs
//!
//! Process-wide state (the signed-in session and the interface language) held in
//! explicit context objects. Views subscribe to changes instead of reading globals.

use serde_json::json;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::domain::{AuthSession, Language, Locale};
use crate::error::CoreResult;
use crate::ports::{Collection, DataStore};
use crate::records::by_id;

//=========================================================================================
// SessionContext
//=========================================================================================

pub struct SessionContext {
    tx: watch::Sender<Option<AuthSession>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.tx.borrow().clone()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.tx.borrow().as_ref().map(|s| s.user_id)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.tx.subscribe()
    }

    pub fn sign_in(&self, session: AuthSession) {
        info!(user_id = %session.user_id, "Signed in");
        self.tx.send_replace(Some(session));
    }

    /// Clears the session; every subscriber observes `None`.
    pub fn sign_out(&self) {
        if self.tx.send_replace(None).is_some() {
            info!("Signed out");
        }
    }
}

//=========================================================================================
// LocaleContext
//=========================================================================================

pub struct LocaleContext {
    tx: watch::Sender<Locale>,
}

impl LocaleContext {
    pub fn new(language: Language) -> Self {
        let (tx, _) = watch::channel(Locale::from(language));
        Self { tx }
    }

    pub fn current(&self) -> Locale {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Locale> {
        self.tx.subscribe()
    }

    /// Publishes the new language (and its text direction) to every subscriber.
    pub fn set_language(&self, language: Language) -> Locale {
        let locale = Locale::from(language);
        self.tx.send_replace(locale);
        locale
    }

    pub fn toggle(&self) -> Locale {
        match self.current().language {
            Language::Ar => self.set_language(Language::En),
            Language::En => self.set_language(Language::Ar),
        }
    }

    /// Stores the current language as the user's preference.
    pub async fn persist_language(&self, store: &dyn DataStore, user_id: Uuid) -> CoreResult<()> {
        let language = self.current().language;
        store
            .update(
                Collection::Profiles,
                &by_id(user_id),
                json!({ "preferred_language": language }),
            )
            .await?;
        Ok(())
    }
}

/// Created once at startup.
pub struct AppContext {
    pub session: SessionContext,
    pub locale: LocaleContext,
}

impl AppContext {
    pub fn new(default_language: Language) -> Self {
        Self {
            session: SessionContext::new(),
            locale: LocaleContext::new(default_language),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use crate::memory::MemoryBackend;

    #[tokio::test]
    async fn test_sign_out_clears_session_for_subscribers() {
        let context = AppContext::new(Language::Ar);
        let mut rx = context.session.subscribe();
        let user_id = Uuid::new_v4();

        context.session.sign_in(AuthSession {
            user_id,
            email: None,
            access_token: "t".to_string(),
        });
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().map(|s| s.user_id), Some(user_id));

        context.session.sign_out();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
        assert_eq!(context.session.user_id(), None);
    }

    #[tokio::test]
    async fn test_language_toggle_flips_direction_and_persists() {
        let backend = MemoryBackend::new();
        let user_id = Uuid::new_v4();
        backend
            .seed(Collection::Profiles, json!({ "id": user_id, "preferred_language": "ar" }))
            .await
            .unwrap();
        let context = LocaleContext::new(Language::Ar);
        let rx = context.subscribe();
        assert_eq!(rx.borrow().direction, Direction::Rtl);

        let locale = context.toggle();
        assert_eq!(locale.direction, Direction::Ltr);
        assert_eq!(rx.borrow().language, Language::En);

        context
            .persist_language(&backend.client(Some(user_id)), user_id)
            .await
            .unwrap();
        assert_eq!(backend.rows(Collection::Profiles).await[0]["preferred_language"], "en");
    }
}
