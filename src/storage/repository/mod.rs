// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the document store.
//!
//! Each repository provides CRUD operations for a specific entity type,
//! using the DocumentStore for all transactions.

pub mod notes;
pub mod oauth_states;
pub mod users;

pub use notes::{NoteRepository, StoredNote, StoredText};
pub use oauth_states::OAuthStateRepository;
pub use users::{fold_username, StoredUser, UserRepository};
