// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session authentication middleware.

use crate::error::AppError;
use crate::services::SESSION_COOKIE;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use uuid::Uuid;

/// Authenticated user resolved from a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
}

/// Raw session tokens presented with the request: the cookie first, then a
/// Bearer header.
pub fn session_tokens(jar: &CookieJar, headers: &HeaderMap) -> Vec<String> {
    let cookie = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    cookie.into_iter().chain(bearer).collect()
}

/// Resolve the caller from the first presented token that names a live
/// session. A stale cookie does not hide a valid Bearer token.
pub fn authorize(state: &AppState, jar: &CookieJar, headers: &HeaderMap) -> Option<AuthUser> {
    session_tokens(jar, headers)
        .iter()
        .find_map(|token| state.sessions.resolve(token))
        .map(|user_id| AuthUser { user_id })
}

/// Middleware for API routes: no valid session means 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user =
        authorize(&state, &jar, request.headers()).ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Middleware for browser pages: no valid session redirects to `/login`.
pub async fn require_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match authorize(&state, &jar, request.headers()) {
        Some(auth_user) => {
            request.extensions_mut().insert(auth_user);
            next.run(request).await
        }
        None => {
            tracing::debug!(path = %request.uri().path(), "Unauthenticated page request");
            Redirect::to("/login").into_response()
        }
    }
}
