// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pending OAuth logins.
//!
//! Each authorization redirect stores its CSRF state with the PKCE verifier.
//! The callback consumes the entry exactly once.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};

use super::super::database::OAUTH_STATES;
use super::super::{DocumentStore, StorageResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct PendingLogin {
    pkce_verifier: String,
    expires_at: DateTime<Utc>,
}

/// Repository for OAuth state bookkeeping.
pub struct OAuthStateRepository<'a> {
    store: &'a DocumentStore,
}

impl<'a> OAuthStateRepository<'a> {
    pub fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }

    /// Record a pending login, dropping any entries that have already expired.
    pub fn insert(
        &self,
        state: &str,
        pkce_verifier: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let json = serde_json::to_vec(&PendingLogin {
            pkce_verifier: pkce_verifier.to_string(),
            expires_at,
        })?;
        let now = Utc::now();

        let write_txn = self.store.db().begin_write()?;
        let purged = {
            let mut table = write_txn.open_table(OAUTH_STATES)?;
            let purged = purge_table(&mut table, now)?;
            table.insert(state, json.as_slice())?;
            purged
        };
        write_txn.commit()?;

        if purged > 0 {
            tracing::debug!(purged, "Purged expired OAuth states");
        }
        Ok(())
    }

    /// Drop every pending login that has expired at `now`.
    ///
    /// Returns how many entries were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let write_txn = self.store.db().begin_write()?;
        let purged = {
            let mut table = write_txn.open_table(OAUTH_STATES)?;
            purge_table(&mut table, now)?
        };
        write_txn.commit()?;
        Ok(purged)
    }

    /// Remove the pending login for `state` and return its PKCE verifier.
    ///
    /// Returns `None` when the state is unknown or expired at `now`.
    pub fn take(&self, state: &str, now: DateTime<Utc>) -> StorageResult<Option<String>> {
        let write_txn = self.store.db().begin_write()?;
        let pending: Option<PendingLogin> = {
            let mut table = write_txn.open_table(OAUTH_STATES)?;
            let removed = table.remove(state)?;
            match removed {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            }
        };
        write_txn.commit()?;

        Ok(pending
            .filter(|p| p.expires_at > now)
            .map(|p| p.pkce_verifier))
    }
}

fn purge_table(
    table: &mut redb::Table<'_, &'static str, &'static [u8]>,
    now: DateTime<Utc>,
) -> StorageResult<usize> {
    let mut expired = Vec::new();
    for entry in table.iter()? {
        let (key, value) = entry?;
        match serde_json::from_slice::<PendingLogin>(value.value()) {
            Ok(pending) if pending.expires_at > now => {}
            // Unreadable entries can never be redeemed
            _ => expired.push(key.value().to_string()),
        }
    }
    for key in &expired {
        table.remove(key.as_str())?;
    }
    Ok(expired.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn test_store() -> (DocumentStore, TempDir) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = DocumentStore::open(&dir.path().join("test.redb")).expect("open store");
        (store, dir)
    }

    #[test]
    fn take_returns_verifier_once() {
        let (store, _dir) = test_store();
        let repo = OAuthStateRepository::new(&store);

        repo.insert("state-1", "verifier-1", Utc::now() + Duration::minutes(10))
            .unwrap();

        assert_eq!(
            repo.take("state-1", Utc::now()).unwrap(),
            Some("verifier-1".to_string())
        );
        assert_eq!(repo.take("state-1", Utc::now()).unwrap(), None);
    }

    #[test]
    fn expired_state_is_rejected() {
        let (store, _dir) = test_store();
        let repo = OAuthStateRepository::new(&store);

        let expires_at = Utc::now() + Duration::minutes(10);
        repo.insert("state-1", "verifier-1", expires_at).unwrap();

        let later = expires_at + Duration::seconds(1);
        assert_eq!(repo.take("state-1", later).unwrap(), None);
    }

    #[test]
    fn unknown_state_is_none() {
        let (store, _dir) = test_store();
        let repo = OAuthStateRepository::new(&store);
        assert_eq!(repo.take("missing", Utc::now()).unwrap(), None);
    }

    #[test]
    fn insert_purges_expired_entries() {
        let (store, _dir) = test_store();
        let repo = OAuthStateRepository::new(&store);

        repo.insert("old", "v-old", Utc::now() - Duration::minutes(1))
            .unwrap();
        repo.insert("new", "v-new", Utc::now() + Duration::minutes(10))
            .unwrap();

        // Even with a clock in the past, the purged entry is gone
        let past = Utc::now() - Duration::hours(1);
        assert_eq!(repo.take("old", past).unwrap(), None);
        assert_eq!(repo.take("new", Utc::now()).unwrap(), Some("v-new".to_string()));
    }

    #[test]
    fn purge_expired_counts_removed_entries() {
        let (store, _dir) = test_store();
        let repo = OAuthStateRepository::new(&store);

        let expires_at = Utc::now() + Duration::minutes(10);
        repo.insert("a", "v-a", expires_at).unwrap();
        repo.insert("b", "v-b", expires_at + Duration::minutes(5)).unwrap();

        let between = expires_at + Duration::minutes(1);
        assert_eq!(repo.purge_expired(between).unwrap(), 1);
        assert_eq!(repo.purge_expired(between).unwrap(), 0);
        assert_eq!(repo.take("b", between).unwrap(), Some("v-b".to_string()));
    }
}
