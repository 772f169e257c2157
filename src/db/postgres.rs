// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostgreSQL adapter.
//!
//! The pool is created lazily: no connection is opened until the first
//! query, and every checkout waits at most the configured acquire timeout.

use super::{CredentialStore, Datastore, RecordStore};
use crate::config::Config;
use crate::error::AppError;
use crate::models::{FitnessRecord, NewUser, User};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use uuid::Uuid;

/// Idempotent table bootstrap, run once at startup.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            UUID PRIMARY KEY,
    email         TEXT NOT NULL,
    username      TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE UNIQUE INDEX IF NOT EXISTS users_email_key ON users (LOWER(email));
CREATE UNIQUE INDEX IF NOT EXISTS users_username_key ON users (LOWER(username));

CREATE TABLE IF NOT EXISTS fitness_data (
    id         UUID PRIMARY KEY,
    user_id    UUID NOT NULL REFERENCES users (id),
    date       DATE NOT NULL,
    steps      BIGINT NOT NULL CHECK (steps >= 0),
    calories   BIGINT NOT NULL CHECK (calories >= 0),
    distance   DOUBLE PRECISION NOT NULL CHECK (distance >= 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS fitness_data_user_date_idx
    ON fitness_data (user_id, date DESC, created_at DESC);
"#;

const RECORD_COLUMNS: &str = "id, user_id, date, steps, calories, distance, created_at";
const USER_COLUMNS: &str = "id, email, username, password_hash, created_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Build a lazily-connecting pool from configuration.
    pub fn connect_lazy(config: &Config) -> Result<Self, AppError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| AppError::Storage("DATABASE_URL is not set".to_string()))?;

        tracing::info!(
            url = %mask_password(url),
            max_connections = config.db_max_connections,
            "Configuring PostgreSQL pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_seconds))
            .connect_lazy(url)
            .map_err(|e| storage_error("Invalid database URL", e))?;

        Ok(Self { pool })
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), AppError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to ensure schema", e))?;
        Ok(())
    }
}

/// Map a sqlx error to a storage error, keeping the detail for the logs.
fn storage_error(context: &str, err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::PoolTimedOut => {
            AppError::Storage(format!("{}: timed out waiting for a connection", context))
        }
        other => AppError::Storage(format!("{}: {}", context, other)),
    }
}

/// Which unique field a violated index guards.
fn duplicate_field(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(name) if name.contains("email") => "email",
        Some(name) if name.contains("username") => "username",
        _ => "email or username",
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, AppError> {
        let query = format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1) OR LOWER(username) = LOWER($1) \
             ORDER BY (LOWER(email) = LOWER($1)) DESC LIMIT 1",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(identifier.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to find user", e))
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to find user by id", e))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let user = User::from_new(new_user);

        sqlx::query(
            "INSERT INTO users (id, email, username, password_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Duplicate(duplicate_field(db_err.constraint()).to_string())
            }
            other => storage_error("Failed to create user", other),
        })?;

        tracing::info!(user_id = %user.id, "User created");
        Ok(user)
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn insert_record(&self, record: &FitnessRecord) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO fitness_data (id, user_id, date, steps, calories, distance, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.date)
        .bind(record.steps)
        .bind(record.calories)
        .bind(record.distance)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to insert fitness record", e))?;
        Ok(())
    }

    async fn list_records_for_user(&self, user_id: Uuid) -> Result<Vec<FitnessRecord>, AppError> {
        let query = format!(
            "SELECT {} FROM fitness_data WHERE user_id = $1 ORDER BY date DESC, created_at DESC",
            RECORD_COLUMNS
        );
        sqlx::query_as::<_, FitnessRecord>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to list fitness records", e))
    }

    async fn get_record_for_user(
        &self,
        user_id: Uuid,
        record_id: Uuid,
    ) -> Result<Option<FitnessRecord>, AppError> {
        let query = format!(
            "SELECT {} FROM fitness_data WHERE id = $1 AND user_id = $2",
            RECORD_COLUMNS
        );
        sqlx::query_as::<_, FitnessRecord>(&query)
            .bind(record_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to fetch fitness record", e))
    }

    async fn delete_record_for_user(
        &self,
        user_id: Uuid,
        record_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM fitness_data WHERE id = $1 AND user_id = $2")
            .bind(record_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to delete fitness record", e))?;
        Ok(result.rows_affected() > 0)
    }
}

impl Datastore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }
}

/// Mask the password portion of a database URL for safe logging.
fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
            if colon_pos > scheme_end {
                return format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..]);
            }
        }
    }
    url.to_string()
}
