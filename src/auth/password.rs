// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Password hashing and verification (bcrypt)
//!
//! - [`hash_password`] salts and hashes a plaintext password with a fixed
//!   work factor and returns the modular-crypt string stored on the user.
//! - [`verify_password`] checks a plaintext attempt against a stored hash.
//!   Returns `Ok(false)` on mismatch and `Err` if the stored hash is malformed.
//!
//! bcrypt only reads the first 72 bytes of its input. Longer passwords are
//! refused at hashing time and never match at verification time.
//!
//! bcrypt is deliberately slow, so handlers use the `_blocking` wrappers that
//! move the work onto tokio's blocking pool.

use std::sync::OnceLock;

use bcrypt::BcryptError;

/// bcrypt work factor.
pub const PASSWORD_HASH_COST: u32 = 10;

/// Longest password bcrypt hashes without truncation.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password is longer than {MAX_PASSWORD_BYTES} bytes")]
    TooLong,

    #[error("password hashing failed: {0}")]
    Hash(#[from] BcryptError),

    #[error("password hashing task failed: {0}")]
    Task(String),
}

/// Hash a password with bcrypt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    match bcrypt::non_truncating_hash(password, PASSWORD_HASH_COST) {
        Ok(hash) => Ok(hash),
        Err(BcryptError::Truncation(_)) => Err(PasswordError::TooLong),
        Err(e) => Err(e.into()),
    }
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    match bcrypt::non_truncating_verify(password, hash) {
        Ok(matches) => Ok(matches),
        Err(BcryptError::Truncation(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Hash of a fixed string, used to spend a full verification on logins that
/// have no real hash to check.
fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("savebook-dummy-password").ok())
        .as_deref()
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| PasswordError::Task(e.to_string()))?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(
    password: String,
    hash: String,
) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| PasswordError::Task(e.to_string()))?
}

/// Run a verification that can never succeed.
///
/// Keeps unknown usernames as slow as wrong passwords.
pub async fn dummy_verify_blocking(password: String) {
    let result = tokio::task::spawn_blocking(move || {
        if let Some(hash) = dummy_hash() {
            let _ = verify_password(&password, hash);
        }
    })
    .await;
    if let Err(e) = result {
        tracing::warn!(error = %e, "Dummy password verification failed");
    }
}
