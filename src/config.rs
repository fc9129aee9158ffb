//! Application configuration loaded from environment variables.
//!
//! A `.env` file is loaded first when present (local development).

use std::env;
use std::str::FromStr;

/// Default photo size limit: keeps a base64-encoded photo inside one
/// Firestore document.
pub const DEFAULT_MAX_PHOTO_BYTES: usize = 700_000;

/// Default Gemini model for the AI features.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Which storage backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Firestore (or its emulator when FIRESTORE_EMULATOR_HOST is set)
    Firestore,
    /// Process-local store; data is lost on restart
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::Invalid("STORE_BACKEND", other.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend origin allowed by CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    pub store_backend: StoreBackend,

    /// Shared HS256 key for identity tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Gemini API key; AI endpoints fail without it
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub max_photo_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:9002".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_var("PORT", 8080)?,
            store_backend: match env::var("STORE_BACKEND") {
                Ok(v) => v.parse()?,
                Err(_) => StoreBackend::Firestore,
            },
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            gemini_api_key: env::var("GEMINI_API_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            max_photo_bytes: parse_var("MAX_PHOTO_BYTES", DEFAULT_MAX_PHOTO_BYTES)?,
        })
    }

    /// Config for tests: in-memory store, no AI key.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:9002".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            max_photo_bytes: DEFAULT_MAX_PHOTO_BYTES,
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
