// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent storage for users, notes and uploaded files.
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   savebook.redb       # Document store (users, notes, OAuth states)
//!   uploads/
//!     {uuid}.{ext}      # Uploaded images, audio and attachments
//! ```
//!
//! Documents are stored as JSON values inside redb tables; secondary indexes
//! (usernames, GitHub accounts, per-owner note listings) live in their own
//! tables and are updated in the same write transaction as the document.

pub mod database;
pub mod ownership;
pub mod paths;
pub mod repository;
pub mod uploads;

pub use database::DocumentStore;
pub use ownership::{OwnedResource, OwnershipEnforcer};
pub use paths::StoragePaths;
pub use repository::{
    fold_username, NoteRepository, OAuthStateRepository, StoredNote, StoredText, StoredUser,
    UserRepository,
};
pub use uploads::{StoredUpload, UploadError, UploadKind, UploadStore, UPLOADS_URL_PREFIX};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// redb failure (open, transaction, table, commit)
    #[error("database error: {0}")]
    Database(String),

    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Entity not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Entity already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Ownership check failed
    #[error("permission denied: user {user_id} cannot access {resource}")]
    PermissionDenied { user_id: String, resource: String },

    /// Sealed content failed to authenticate
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
