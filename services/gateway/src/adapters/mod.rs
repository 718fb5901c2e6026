pub mod rest;

pub use rest::RestBackend;

use academy_core::memory::MemoryBackend;
use academy_core::{AuthSession, Backend};
use std::sync::Arc;

/// Produces the backend ports for one request, bound to the caller's credentials.
pub trait Connector: Send + Sync {
    fn connect(&self, session: Option<&AuthSession>) -> Backend;
}

impl Connector for RestBackend {
    fn connect(&self, session: Option<&AuthSession>) -> Backend {
        let client = Arc::new(match session {
            Some(session) => self.with_token(&session.access_token),
            None => self.clone(),
        });
        Backend::new(client.clone(), client)
    }
}

impl Connector for MemoryBackend {
    fn connect(&self, session: Option<&AuthSession>) -> Backend {
        self.backend(session.map(|s| s.user_id))
    }
}
