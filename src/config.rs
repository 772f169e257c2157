//! Application configuration loaded from environment variables.
//!
//! Values are read once at startup. A `.env` file is honored for local
//! development.

use std::env;
use std::str::FromStr;

/// Which backing store holds users and fitness records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatastoreKind {
    /// In-process maps; data is lost on restart.
    Memory,
    /// Google Cloud Firestore (document store).
    Firestore,
    /// PostgreSQL (relational store).
    Postgres,
}

impl FromStr for DatastoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "firestore" => Ok(Self::Firestore),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err(ConfigError::Invalid("DATASTORE", s.to_string())),
        }
    }
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordWorkFactor {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordWorkFactor {
    /// OWASP-recommended Argon2id baseline.
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Externally visible base URL (cookie `Secure` flag, CORS origin)
    pub public_url: String,

    /// Secret the session cookie MAC key is derived from (raw bytes)
    pub session_secret: Vec<u8>,
    /// Session lifetime in seconds
    pub session_ttl_seconds: u64,
    /// How often expired sessions are purged
    pub session_cleanup_interval_seconds: u64,

    pub datastore: DatastoreKind,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Postgres connection URL
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Upper bound on waiting for a pooled connection
    pub db_acquire_timeout_seconds: u64,

    pub password_work_factor: PasswordWorkFactor,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            port: 8080,
            public_url: "http://localhost:8080".to_string(),
            session_secret: b"test_session_secret_32_bytes_min!".to_vec(),
            session_ttl_seconds: 24 * 60 * 60,
            session_cleanup_interval_seconds: 300,
            datastore: DatastoreKind::Memory,
            gcp_project_id: "test-project".to_string(),
            database_url: None,
            db_max_connections: 5,
            db_acquire_timeout_seconds: 5,
            // Minimal cost keeps the test suite fast.
            password_work_factor: PasswordWorkFactor {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
        }
    }
}

impl Config {
    /// Minimum accepted length of `SESSION_SECRET`.
    pub const MIN_SESSION_SECRET_LEN: usize = 32;

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let session_secret = env::var("SESSION_SECRET")
            .map_err(|_| ConfigError::Missing("SESSION_SECRET"))?
            .into_bytes();
        if session_secret.len() < Self::MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::Invalid(
                "SESSION_SECRET",
                format!("must be at least {} bytes", Self::MIN_SESSION_SECRET_LEN),
            ));
        }

        let datastore: DatastoreKind = env::var("DATASTORE")
            .unwrap_or_else(|_| "memory".to_string())
            .parse()?;

        let database_url = env::var("DATABASE_URL").ok();
        if datastore == DatastoreKind::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let defaults = PasswordWorkFactor::default();

        Ok(Self {
            port: parse_var("PORT", 8080)?,
            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            session_secret,
            session_ttl_seconds: parse_var("SESSION_TTL_SECONDS", 24 * 60 * 60)?,
            session_cleanup_interval_seconds: parse_var("SESSION_CLEANUP_INTERVAL_SECONDS", 300)?,
            datastore,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            database_url,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 10)?,
            db_acquire_timeout_seconds: parse_var("DB_ACQUIRE_TIMEOUT_SECONDS", 5)?,
            password_work_factor: PasswordWorkFactor {
                memory_kib: parse_var("PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
                iterations: parse_var("PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
                parallelism: parse_var("PASSWORD_HASH_PARALLELISM", defaults.parallelism)?,
            },
        })
    }

    /// Cookies get the `Secure` attribute when served over HTTPS.
    pub fn secure_cookies(&self) -> bool {
        self.public_url.starts_with("https://")
    }
}

/// Read an optional numeric variable, rejecting values that do not parse.
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

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
