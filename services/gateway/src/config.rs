//! services/gateway/src/config.rs
//!
//! Defines the gateway's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use academy_core::Language;
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which backend the gateway talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendMode {
    /// The hosted backend-as-a-service.
    Remote { url: String, anon_key: String },
    /// An in-process store seeded with demo data, for local development.
    Memory,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub backend: BackendMode,
    pub log_level: Level,
    pub default_language: Language,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Server Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        // --- Backend Settings ---
        let mode = var("BACKEND_MODE").unwrap_or_else(|| "remote".to_string());
        let backend = match mode.to_lowercase().as_str() {
            "remote" => BackendMode::Remote {
                url: var("BACKEND_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .ok_or_else(|| ConfigError::MissingVar("BACKEND_URL".to_string()))?,
                anon_key: var("BACKEND_ANON_KEY")
                    .ok_or_else(|| ConfigError::MissingVar("BACKEND_ANON_KEY".to_string()))?,
            },
            "memory" => BackendMode::Memory,
            other => {
                return Err(ConfigError::InvalidValue(
                    "BACKEND_MODE".to_string(),
                    format!("'{}' is not one of remote, memory", other),
                ))
            }
        };

        // --- Locale ---
        let default_language = match var("DEFAULT_LANGUAGE") {
            Some(value) => value
                .parse::<Language>()
                .map_err(|e| ConfigError::InvalidValue("DEFAULT_LANGUAGE".to_string(), e))?,
            None => Language::Ar,
        };

        Ok(Self {
            bind_address,
            backend,
            log_level,
            default_language,
            cors_origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_remote_mode_requires_backend_url() {
        let err = load(&[("BACKEND_ANON_KEY", "anon")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "BACKEND_URL"));
    }

    #[test]
    fn test_memory_mode_defaults() {
        let config = load(&[("BACKEND_MODE", "memory")]).unwrap();
        assert_eq!(config.backend, BackendMode::Memory);
        assert_eq!(config.default_language, Language::Ar);
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn test_remote_mode_trims_trailing_slash() {
        let config = load(&[
            ("BACKEND_URL", "https://example.supabase.co/"),
            ("BACKEND_ANON_KEY", "anon"),
            ("DEFAULT_LANGUAGE", "en"),
        ])
        .unwrap();
        assert_eq!(
            config.backend,
            BackendMode::Remote {
                url: "https://example.supabase.co".to_string(),
                anon_key: "anon".to_string()
            }
        );
        assert_eq!(config.default_language, Language::En);
    }

    #[test]
    fn test_invalid_language_is_rejected() {
        let err = load(&[("BACKEND_MODE", "memory"), ("DEFAULT_LANGUAGE", "fr")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "DEFAULT_LANGUAGE"));
    }
}
