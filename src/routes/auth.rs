// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registration, login and logout routes.
//!
//! Each flow exists twice: a form variant that answers with redirects, and a
//! JSON variant under `/api` that answers with status codes.

use axum::{
    extract::{rejection::FormRejection, rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::post,
    Form, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::middleware::auth::session_tokens;
use crate::routes::api::UserResponse;
use crate::services::{Credentials, Registration, SessionToken, SESSION_COOKIE};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register_form))
        .route("/login", post(login_form))
        .route("/logout", post(logout_form))
        .route("/api/register", post(register_api))
        .route("/api/login", post(login_api))
        .route("/api/logout", post(logout_api))
}

/// Build the session cookie for a freshly issued token.
pub fn session_cookie(config: &Config, token: SessionToken) -> Cookie<'static> {
    let max_age = i64::try_from(config.session_ttl_seconds).unwrap_or(i64::MAX);

    Cookie::build((SESSION_COOKIE, token.into_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies())
        .path("/")
        .max_age(time::Duration::seconds(max_age))
        .build()
}

/// A cookie that, once sent, removes the session cookie from the browser.
/// Attributes match [`session_cookie`] so browsers treat it as the same cookie.
fn removal_cookie(config: &Config) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies())
        .path("/")
        .build()
}

/// Redirect code for a failed form submission.
///
/// Server-side failures collapse into one code so nothing internal leaks
/// into a URL.
pub(crate) fn form_error_code(err: &AppError) -> &'static str {
    if err.is_client_error() {
        err.code()
    } else {
        "server_error"
    }
}

pub(crate) fn redirect_with_error(path: &str, code: &str) -> Redirect {
    Redirect::to(&format!("{}?error={}", path, urlencoding::encode(code)))
}

// ─── Form flows ──────────────────────────────────────────────

async fn register_form(
    State(state): State<Arc<AppState>>,
    form: std::result::Result<Form<Registration>, FormRejection>,
) -> Redirect {
    let Ok(Form(registration)) = form else {
        return redirect_with_error("/register", "invalid_input");
    };

    match state.accounts.register(registration).await {
        Ok(_) => Redirect::to("/login"),
        Err(e) => redirect_with_error("/register", form_error_code(&e)),
    }
}

async fn login_form(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    form: std::result::Result<Form<Credentials>, FormRejection>,
) -> (CookieJar, Redirect) {
    let Ok(Form(credentials)) = form else {
        return (jar, redirect_with_error("/login", "invalid_credentials"));
    };

    match state.accounts.login(credentials).await {
        Ok((_, token)) => (
            jar.add(session_cookie(&state.config, token)),
            Redirect::to("/dashboard"),
        ),
        // Validation failures on login look like any other failed login.
        Err(e) if e.is_client_error() => {
            (jar, redirect_with_error("/login", "invalid_credentials"))
        }
        Err(e) => {
            tracing::error!(error = %e, "Login failed with server error");
            (jar, redirect_with_error("/login", "server_error"))
        }
    }
}

async fn logout_form(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> (CookieJar, Redirect) {
    for token in session_tokens(&jar, &headers) {
        state.accounts.logout(&token);
    }
    (jar.remove(removal_cookie(&state.config)), Redirect::to("/login"))
}

// ─── JSON flows ──────────────────────────────────────────────

/// Successful API login.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoginResponse {
    pub user: UserResponse,
    /// Same value as the cookie, for clients that send a Bearer header.
    pub token: String,
}

/// Unwrap a JSON body, turning malformed input into a 400.
pub(crate) fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::Validation(e.body_text()))
}

async fn register_api(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<Registration>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let user = state.accounts.register(json_body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn login_api(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let credentials = json_body(payload).map_err(|_| AppError::InvalidCredentials)?;
    let (user, token) = state
        .accounts
        .login(credentials)
        .await
        .map_err(|e| match e {
            AppError::Validation(_) => AppError::InvalidCredentials,
            other => other,
        })?;

    let body = LoginResponse {
        user: user.into(),
        token: token.as_str().to_string(),
    };
    Ok((jar.add(session_cookie(&state.config, token)), Json(body)))
}

async fn logout_api(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Response {
    for token in session_tokens(&jar, &headers) {
        state.accounts.logout(&token);
    }
    (jar.remove(removal_cookie(&state.config)), StatusCode::NO_CONTENT).into_response()
}
