// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! GitHub sign-in endpoints.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header::SET_COOKIE,
    response::Redirect,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    api::auth::SetCookie,
    auth::{github::find_or_create_user, GitHubOAuth},
    error::ApiError,
    state::AppState,
    storage::OAuthStateRepository,
};

/// How long a started GitHub login stays valid.
const OAUTH_STATE_TTL_MINUTES: i64 = 10;

/// Query parameters GitHub sends back to the callback.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set when the user denied access.
    pub error: Option<String>,
}

fn github_client(state: &AppState) -> Result<Arc<GitHubOAuth>, ApiError> {
    state
        .github
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("GitHub login is not configured"))
}

/// Start GitHub sign-in.
///
/// Redirects the browser to GitHub's consent page.
#[utoipa::path(
    get,
    path = "/api/auth/github",
    tag = "Auth",
    responses(
        (status = 303, description = "Redirect to GitHub"),
        (status = 503, description = "GitHub login is not configured")
    )
)]
pub async fn github_login(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let github = github_client(&state)?;
    let pending = github.authorize_url();

    let expires_at = Utc::now() + Duration::minutes(OAUTH_STATE_TTL_MINUTES);
    OAuthStateRepository::new(&state.store).insert(
        &pending.state,
        &pending.pkce_verifier,
        expires_at,
    )?;

    Ok(Redirect::to(&pending.url))
}

/// Complete GitHub sign-in.
///
/// Consumes the stored state, links or creates the account, sets the session
/// cookie and redirects to the frontend.
#[utoipa::path(
    get,
    path = "/api/auth/github/callback",
    tag = "Auth",
    params(CallbackQuery),
    responses(
        (status = 303, description = "Signed in; session cookie set; redirect to the frontend"),
        (status = 400, description = "Missing code or state"),
        (status = 401, description = "Access denied, or unknown or expired state"),
        (status = 502, description = "GitHub rejected the code or was unreachable"),
        (status = 503, description = "GitHub login is not configured")
    )
)]
pub async fn github_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<(SetCookie, Redirect), ApiError> {
    let github = github_client(&state)?;

    if let Some(error) = &query.error {
        tracing::info!(error = %error, "GitHub authorization was not granted");
        return Err(ApiError::unauthorized("GitHub authorization was denied"));
    }

    let (code, csrf_state) = match (query.code.as_deref(), query.state.as_deref()) {
        (Some(code), Some(csrf_state)) if !code.is_empty() && !csrf_state.is_empty() => {
            (code, csrf_state)
        }
        _ => return Err(ApiError::bad_request("Missing code or state")),
    };

    let pkce_verifier = OAuthStateRepository::new(&state.store)
        .take(csrf_state, Utc::now())?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired OAuth state"))?;

    let profile = github
        .exchange_code(code, pkce_verifier)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "GitHub code exchange failed");
            ApiError::new(
                axum::http::StatusCode::BAD_GATEWAY,
                "GitHub sign-in failed",
            )
        })?;

    let (user, created) = find_or_create_user(&state.store, &profile)?;

    let token = state.sessions.sign(&user.id)?;
    let cookie = state.cookies.session_cookie(&token);

    tracing::info!(user_id = %user.id, created, "User logged in with GitHub");

    Ok((
        [(SET_COOKIE, cookie.to_string())],
        Redirect::to(&state.frontend_url),
    ))
}
