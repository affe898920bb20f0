// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request body validation.

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::error::ApiError;
use crate::storage::{fold_username, UPLOADS_URL_PREFIX};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;

/// JSON body that has passed its `validator` rules.
///
/// Parse failures and rule violations both become `400` with a readable
/// message.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

        value
            .validate()
            .map_err(|errors| ApiError::bad_request(first_message(&errors)))?;

        Ok(Self(value))
    }
}

/// The first violation, by field name, as a user-facing message.
fn first_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<(String, String)> = errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errs)| {
            errs.first().map(|e| {
                let message = match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid value for {field}"),
                };
                (field.to_string(), message)
            })
        })
        .collect();
    messages.sort();

    messages
        .into_iter()
        .next()
        .map(|(_, message)| message)
        .unwrap_or_else(|| "Request body is invalid".to_string())
}

/// Fold a username and check it is 3-30 characters of `[a-z0-9_.-]`.
pub fn normalize_username(raw: &str) -> Result<String, ApiError> {
    let username = fold_username(raw);
    let len = username.chars().count();

    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(ApiError::bad_request(format!(
            "Username must be {USERNAME_MIN_LEN}-{USERNAME_MAX_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'))
    {
        return Err(ApiError::bad_request(
            "Username may only contain letters, digits, '_', '.' and '-'",
        ));
    }

    Ok(username)
}

/// Absolute `http(s)` URL.
pub fn is_web_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

/// Absolute `http(s)` URL, or a path to a file served from the upload
/// directory.
pub fn is_media_url(value: &str) -> bool {
    if let Some(name) = value
        .strip_prefix(UPLOADS_URL_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
    {
        return !name.is_empty() && !name.contains('/') && !name.contains("..");
    }
    is_web_url(value)
}

/// Trim a free-text field; `None` when it ends up empty.
pub fn trimmed(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
