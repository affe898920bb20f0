// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account API endpoints.
//!
//! Registration, username/password login, logout and profile management.
//! Login sets the session cookie; logout clears it.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderName, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    api::validation::{is_media_url, normalize_username, trimmed, ValidatedJson},
    auth::{
        password::{
            dummy_verify_blocking, hash_password_blocking, verify_password_blocking,
            MAX_PASSWORD_BYTES,
        },
        Auth,
    },
    error::{ApiError, PASSWORD_TOO_LONG},
    models::MessageResponse,
    state::AppState,
    storage::{fold_username, StorageError, StoredUser, UserRepository},
};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// `Set-Cookie` header produced by login-like endpoints.
pub type SetCookie = [(HeaderName, String); 1];

/// How an account signs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Github,
}

/// Public view of a user. Never includes the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub provider: AuthProvider,
    pub created_at: DateTime<Utc>,
}

impl From<StoredUser> for UserProfile {
    fn from(user: StoredUser) -> Self {
        let provider = if user.github_id.is_some() {
            AuthProvider::Github
        } else {
            AuthProvider::Local
        };
        Self {
            id: user.id,
            username: user.username,
            name: user.name,
            bio: user.bio,
            location: user.location,
            avatar_url: user.avatar_url,
            provider,
            created_at: user.created_at,
        }
    }
}

/// Request to create an account.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// 3-30 characters of `[a-z0-9_.-]`, compared case-insensitively.
    pub username: String,
    #[validate(length(min = 6, max = 64, message = "Password must be 6-64 characters"))]
    pub password: String,
    /// Must equal `password` when present.
    #[serde(default)]
    pub confirm_password: Option<String>,
}

/// Login credentials.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Profile edits. Omitted fields are left alone; empty strings clear.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(max = 50, message = "Name must be at most 50 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 160, message = "Bio must be at most 160 characters"))]
    pub bio: Option<String>,
    #[validate(length(max = 100, message = "Location must be at most 100 characters"))]
    pub location: Option<String>,
    pub avatar_url: Option<String>,
}

/// Account response with a status message.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    pub user: UserProfile,
}

/// Create an account.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid username, password or confirmation"),
        (status = 409, description = "Username already exists")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let username = normalize_username(&request.username)?;

    if request.password.len() > MAX_PASSWORD_BYTES {
        return Err(ApiError::bad_request(PASSWORD_TOO_LONG));
    }

    if let Some(confirm) = &request.confirm_password {
        if *confirm != request.password {
            return Err(ApiError::bad_request("Passwords do not match"));
        }
    }

    let repo = UserRepository::new(&state.store);
    if repo.username_taken(&username)? {
        return Err(ApiError::conflict("Username already exists"));
    }

    let hash = hash_password_blocking(request.password).await?;
    let user = StoredUser::with_password(&username, hash);

    match repo.create(&user) {
        Ok(()) => {}
        Err(StorageError::AlreadyExists(_)) => {
            return Err(ApiError::conflict("Username already exists"))
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".to_string(),
            user: user.into(),
        }),
    ))
}

/// Sign in with username and password.
///
/// Sets the `authToken` session cookie on success.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; session cookie set", body = AuthResponse),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid username or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<(SetCookie, Json<AuthResponse>), ApiError> {
    let username = fold_username(&request.username);
    let repo = UserRepository::new(&state.store);

    let user = repo.find_by_username(&username)?;

    // Unknown users and GitHub-only accounts still pay for one verification
    let Some((user, hash)) = user.and_then(|u| u.password_hash.clone().map(|h| (u, h))) else {
        dummy_verify_blocking(request.password).await;
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    if !verify_password_blocking(request.password, hash).await? {
        tracing::warn!(user_id = %user.id, "Failed login attempt");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let token = state.sessions.sign(&user.id)?;
    let cookie = state.cookies.session_cookie(&token);

    tracing::info!(user_id = %user.id, "User logged in");

    Ok((
        [(SET_COOKIE, cookie.to_string())],
        Json(AuthResponse {
            message: "Login successful".to_string(),
            user: user.into(),
        }),
    ))
}

/// Clear the session cookie.
#[utoipa::path(
    get,
    path = "/api/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Session cookie cleared", body = MessageResponse)
    )
)]
pub async fn logout(State(state): State<AppState>) -> (SetCookie, Json<MessageResponse>) {
    (
        [(SET_COOKIE, state.cookies.removal_cookie().to_string())],
        Json(MessageResponse::new("Logged out successfully")),
    )
}

/// Get the signed-in user's profile.
#[utoipa::path(
    get,
    path = "/api/auth/user",
    tag = "Auth",
    security(("cookie_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    )
)]
pub async fn current_user(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, ApiError> {
    let stored = UserRepository::new(&state.store)
        .get(&user.user_id)
        .map_err(|e| match e {
            StorageError::NotFound(_) => ApiError::not_found("User not found"),
            other => other.into(),
        })?;

    Ok(Json(stored.into()))
}

/// Update profile fields of the signed-in user.
#[utoipa::path(
    put,
    path = "/api/auth/update-profile",
    tag = "Auth",
    security(("cookie_auth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = AuthResponse),
        (status = 400, description = "Invalid profile field"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_profile(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let repo = UserRepository::new(&state.store);
    let mut stored = repo.get(&user.user_id).map_err(|e| match e {
        StorageError::NotFound(_) => ApiError::not_found("User not found"),
        other => other.into(),
    })?;

    if let Some(name) = &request.name {
        stored.name = trimmed(name);
    }
    if let Some(bio) = &request.bio {
        stored.bio = trimmed(bio);
    }
    if let Some(location) = &request.location {
        stored.location = trimmed(location);
    }
    if let Some(avatar_url) = &request.avatar_url {
        let avatar_url = trimmed(avatar_url);
        if let Some(url) = &avatar_url {
            if !is_media_url(url) {
                return Err(ApiError::bad_request(
                    "Avatar URL must be http(s) or an /uploads path",
                ));
            }
        }
        stored.avatar_url = avatar_url;
    }
    stored.updated_at = Utc::now();

    repo.update(&stored)?;

    tracing::info!(user_id = %user.user_id, "Profile updated");

    Ok(Json(AuthResponse {
        message: "Profile updated successfully".to_string(),
        user: stored.into(),
    }))
}
