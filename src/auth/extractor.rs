// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require a session:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{cookie::session_token_from_headers, AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Extractor for authenticated users.
///
/// The token is read from the `authToken` cookie first. Clients that cannot
/// hold cookies may send `Authorization: Bearer <token>` instead.
///
/// # Example
///
/// ```rust,ignore
/// async fn list_notes(
///     Auth(user): Auth,
///     State(state): State<AppState>,
/// ) -> Result<Json<NoteListResponse>, ApiError> {
///     // user.user_id contains the authenticated user's ID
/// }
/// ```
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Already resolved earlier in this request
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let token = match session_token_from_headers(&parts.headers) {
            Some(token) => token,
            None => bearer_token(parts)?,
        };

        let claims = state.sessions.verify(&token)?;
        let user = AuthenticatedUser::from_claims(claims);

        parts.extensions.insert(user.clone());
        Ok(Auth(user))
    }
}

/// Extractor for routes that work with or without a session.
///
/// Never rejects: a missing or invalid token yields `OptionalAuth(None)`.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(
            Auth::from_request_parts(parts, state)
                .await
                .ok()
                .map(|Auth(user)| user),
        ))
    }
}

fn bearer_token(parts: &Parts) -> Result<String, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingSession)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    auth_header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or(AuthError::InvalidAuthHeader)
}
