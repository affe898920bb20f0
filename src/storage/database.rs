// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded document store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized StoredUser
//! - `usernames`: folded username → user_id (uniqueness index)
//! - `github_accounts`: GitHub account id → user_id
//! - `notes`: note_id → serialized StoredNote
//! - `owner_notes`: composite key (owner|!created_ms|note_id) → note_id
//! - `oauth_states`: CSRF state → serialized pending OAuth login

use std::path::Path;

use redb::{Database, ReadableDatabase, TableDefinition};

use super::{StorageError, StorageResult};

// =============================================================================
// Table Definitions
// =============================================================================

pub(super) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Folded usernames. A write transaction checks and inserts here before the
/// user document, so two registrations cannot claim the same name.
pub(super) const USERNAMES: TableDefinition<&str, &str> = TableDefinition::new("usernames");

pub(super) const GITHUB_ACCOUNTS: TableDefinition<&str, &str> =
    TableDefinition::new("github_accounts");

pub(super) const NOTES: TableDefinition<&str, &[u8]> = TableDefinition::new("notes");

/// Key format: `owner_user_id | !created_at_millis_be | note_id` for
/// newest-first range scans.
pub(super) const OWNER_NOTES: TableDefinition<&[u8], &str> = TableDefinition::new("owner_notes");

pub(super) const OAUTH_STATES: TableDefinition<&str, &[u8]> = TableDefinition::new("oauth_states");

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "savebook.redb";

// =============================================================================
// DocumentStore
// =============================================================================

/// Embedded ACID store for user, note and OAuth state documents.
pub struct DocumentStore {
    db: Database,
}

impl DocumentStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USERNAMES)?;
            let _ = write_txn.open_table(GITHUB_ACCOUNTS)?;
            let _ = write_txn.open_table(NOTES)?;
            let _ = write_txn.open_table(OWNER_NOTES)?;
            let _ = write_txn.open_table(OAUTH_STATES)?;
        }
        write_txn.commit()?;

        tracing::debug!(path = %path.display(), "Document store opened");
        Ok(Self { db })
    }

    pub(super) fn db(&self) -> &Database {
        &self.db
    }

    /// Verify the store answers a read transaction.
    pub fn health_check(&self) -> StorageResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(USERS)?;
        Ok(())
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore").finish_non_exhaustive()
    }
}

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key for the owner_notes table.
///
/// The inverted timestamp ensures newest-first ordering when scanning forward.
pub(super) fn make_owner_note_key(owner_user_id: &str, created_at_ms: i64, note_id: &str) -> Vec<u8> {
    let mut key = make_owner_prefix(owner_user_id);
    key.reserve(8 + 1 + note_id.len());
    key.extend_from_slice(&(!created_at_ms as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(note_id.as_bytes());
    key
}

/// Build a prefix key for range scanning all notes of an owner.
pub(super) fn make_owner_prefix(owner_user_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(owner_user_id.len() + 1);
    prefix.extend_from_slice(owner_user_id.as_bytes());
    prefix.push(b'|');
    prefix
}

impl From<redb::Error> for StorageError {
    fn from(e: redb::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(e: redb::DatabaseError) -> Self {
        StorageError::Database(e.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(e: redb::TransactionError) -> Self {
        StorageError::Database(e.to_string())
    }
}

impl From<redb::TableError> for StorageError {
    fn from(e: redb::TableError) -> Self {
        StorageError::Database(e.to_string())
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(e: redb::StorageError) -> Self {
        StorageError::Database(e.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(e: redb::CommitError) -> Self {
        StorageError::Database(e.to_string())
    }
}
