// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Browser-facing routes behind the login redirect.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::RecordDraft;
use crate::routes::api::FitnessRecordResponse;
use crate::routes::auth::{form_error_code, redirect_with_error};
use crate::AppState;
use axum::{
    extract::{rejection::FormRejection, State},
    response::Redirect,
    routing::{get, post},
    Extension, Form, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/fitness/add", post(add_fitness_form))
}

/// Everything the dashboard page renders.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DashboardView {
    pub username: String,
    pub entries: Vec<FitnessRecordResponse>,
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DashboardView>> {
    let profile = state.accounts.current_user(user.user_id).await?;
    let entries = state.records.list_records(user.user_id).await?;

    Ok(Json(DashboardView {
        username: profile.username,
        entries: entries.into_iter().map(Into::into).collect(),
    }))
}

async fn add_fitness_form(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    form: std::result::Result<Form<RecordDraft>, FormRejection>,
) -> Redirect {
    let Ok(Form(draft)) = form else {
        return redirect_with_error("/dashboard", "invalid_input");
    };

    match state.records.add_record(user.user_id, draft).await {
        Ok(_) => Redirect::to("/dashboard"),
        Err(e) => redirect_with_error("/dashboard", form_error_code(&e)),
    }
}
