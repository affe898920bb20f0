// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User repository.
//!
//! Users are keyed by UUID. The folded username and the optional GitHub
//! account id are secondary indexes maintained in the same transaction.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use super::super::database::{GITHUB_ACCOUNTS, USERNAMES, USERS};
use super::super::{DocumentStore, StorageError, StorageResult};

/// Canonical form of a username: trimmed, NFKC-normalized, lower-cased.
pub fn fold_username(raw: &str) -> String {
    raw.trim().nfkc().collect::<String>().to_lowercase()
}

/// User document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredUser {
    /// Unique user identifier (UUID)
    pub id: String,
    /// Folded username
    pub username: String,
    /// bcrypt hash; `None` for accounts created through GitHub
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub avatar_url: Option<String>,
    /// Linked GitHub account id
    pub github_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredUser {
    /// New user with a password and no profile fields.
    pub fn with_password(username: &str, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: fold_username(username),
            password_hash: Some(password_hash),
            name: None,
            bio: None,
            location: None,
            avatar_url: None,
            github_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository for user operations on the document store.
pub struct UserRepository<'a> {
    store: &'a DocumentStore,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository.
    pub fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }

    /// Get a user by ID.
    pub fn get(&self, user_id: &str) -> StorageResult<StoredUser> {
        let read_txn = self.store.db().begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(user_id)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(StorageError::NotFound(format!("User {user_id}"))),
        }
    }

    /// Create a new user.
    ///
    /// Fails with `AlreadyExists` if the folded username (or GitHub account)
    /// is already claimed.
    pub fn create(&self, user: &StoredUser) -> StorageResult<()> {
        let username = fold_username(&user.username);
        let json = serde_json::to_vec(user)?;

        let write_txn = self.store.db().begin_write()?;
        {
            let mut names = write_txn.open_table(USERNAMES)?;
            if names.get(username.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!("Username {username}")));
            }

            let mut users = write_txn.open_table(USERS)?;
            if users.get(user.id.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!("User {}", user.id)));
            }

            if let Some(github_id) = &user.github_id {
                let mut accounts = write_txn.open_table(GITHUB_ACCOUNTS)?;
                if accounts.get(github_id.as_str())?.is_some() {
                    return Err(StorageError::AlreadyExists(format!(
                        "GitHub account {github_id}"
                    )));
                }
                accounts.insert(github_id.as_str(), user.id.as_str())?;
            }

            names.insert(username.as_str(), user.id.as_str())?;
            users.insert(user.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;

        tracing::debug!(user_id = %user.id, "User created");
        Ok(())
    }

    /// Replace an existing user document.
    ///
    /// The username and GitHub link are fixed at creation; changes to them
    /// are rejected so the indexes cannot drift.
    pub fn update(&self, user: &StoredUser) -> StorageResult<()> {
        let json = serde_json::to_vec(user)?;

        let write_txn = self.store.db().begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;
            let existing: StoredUser = {
                let existing = users
                    .get(user.id.as_str())?
                    .ok_or_else(|| StorageError::NotFound(format!("User {}", user.id)))?;
                serde_json::from_slice(existing.value())?
            };

            if existing.username != user.username || existing.github_id != user.github_id {
                return Err(StorageError::PermissionDenied {
                    user_id: user.id.clone(),
                    resource: "username or linked account".to_string(),
                });
            }

            users.insert(user.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a user by username (folded before lookup).
    pub fn find_by_username(&self, username: &str) -> StorageResult<Option<StoredUser>> {
        let username = fold_username(username);
        let user_id = {
            let read_txn = self.store.db().begin_read()?;
            let names = read_txn.open_table(USERNAMES)?;
            match names.get(username.as_str())? {
                Some(v) => v.value().to_string(),
                None => return Ok(None),
            }
        };
        self.get(&user_id).map(Some)
    }

    /// Look up the user linked to a GitHub account.
    pub fn find_by_github_id(&self, github_id: &str) -> StorageResult<Option<StoredUser>> {
        let user_id = {
            let read_txn = self.store.db().begin_read()?;
            let accounts = read_txn.open_table(GITHUB_ACCOUNTS)?;
            match accounts.get(github_id)? {
                Some(v) => v.value().to_string(),
                None => return Ok(None),
            }
        };
        self.get(&user_id).map(Some)
    }

    /// Check whether a username is claimed.
    pub fn username_taken(&self, username: &str) -> StorageResult<bool> {
        let username = fold_username(username);
        let read_txn = self.store.db().begin_read()?;
        let names = read_txn.open_table(USERNAMES)?;
        Ok(names.get(username.as_str())?.is_some())
    }
}
