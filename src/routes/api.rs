// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{FitnessRecord, RecordDraft, User};
use crate::routes::auth::json_body;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

/// API routes (require session authentication).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/fitness", get(list_fitness).post(add_fitness))
        .route(
            "/api/fitness/{id}",
            get(get_fitness).delete(delete_fitness),
        )
        .route("/api/users/{id}/fitness", get(list_user_fitness))
}

// ─── User Profile ────────────────────────────────────────────

/// Public view of a user. Never includes the password hash.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            created_at: user.created_at,
        }
    }
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state.accounts.current_user(user.user_id).await?;
    Ok(Json(profile.into()))
}

// ─── Fitness Records ─────────────────────────────────────────

/// One fitness record as returned to its owner.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FitnessRecordResponse {
    pub id: Uuid,
    pub date: NaiveDate,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub steps: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub calories: i64,
    pub distance: f64,
    pub created_at: DateTime<Utc>,
}

impl From<FitnessRecord> for FitnessRecordResponse {
    fn from(record: FitnessRecord) -> Self {
        Self {
            id: record.id,
            date: record.date,
            steps: record.steps,
            calories: record.calories,
            distance: record.distance,
            created_at: record.created_at,
        }
    }
}

fn to_responses(records: Vec<FitnessRecord>) -> Vec<FitnessRecordResponse> {
    records.into_iter().map(Into::into).collect()
}

/// List the caller's records, newest date first.
async fn list_fitness(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<FitnessRecordResponse>>> {
    let records = state.records.list_records(user.user_id).await?;
    Ok(Json(to_responses(records)))
}

/// Add a record for the caller. Any owner field in the body is ignored.
async fn add_fitness(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<RecordDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<FitnessRecordResponse>)> {
    let record = state
        .records
        .add_record(user.user_id, json_body(payload)?)
        .await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

async fn get_fitness(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(record_id): Path<Uuid>,
) -> Result<Json<FitnessRecordResponse>> {
    let record = state.records.get_record(user.user_id, record_id).await?;
    Ok(Json(record.into()))
}

async fn delete_fitness(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(record_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.records.delete_record(user.user_id, record_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List records by owner id in the path. Only the caller's own id is allowed.
async fn list_user_fitness(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(owner_id): Path<Uuid>,
) -> Result<Json<Vec<FitnessRecordResponse>>> {
    if owner_id != user.user_id {
        tracing::warn!(
            user_id = %user.user_id,
            requested = %owner_id,
            "Cross-user record access denied"
        );
        return Err(AppError::Forbidden);
    }

    let records = state.records.list_records(user.user_id).await?;
    Ok(Json(to_responses(records)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_response_omits_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert_eq!(json["username"], "alice");
        assert!(json.get("password_hash").is_none());
        assert!(!json.to_string().contains("argon2"));
    }
}
