// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Note repository.
//!
//! Notes are stored by ID with a per-owner index ordered newest first.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};

use super::super::database::{make_owner_note_key, make_owner_prefix, NOTES, OWNER_NOTES};
use super::super::{DocumentStore, StorageError, StorageResult};
use crate::crypto::{Envelope, NoteCipher};
use crate::models::{AudioAttachment, NoteText};

/// Title or description as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredText {
    /// Stored as received.
    Plain { value: String },
    /// Plain text the server encrypted with its note secret.
    Sealed { envelope: Envelope },
    /// Envelope encrypted by the client; opaque to the server.
    Opaque { envelope: Envelope },
}

impl StoredText {
    /// Convert client text for storage, sealing plain text when a cipher is
    /// configured.
    pub fn seal(text: NoteText, cipher: Option<&NoteCipher>) -> StorageResult<Self> {
        match (text, cipher) {
            (NoteText::Encrypted(envelope), _) => Ok(StoredText::Opaque { envelope }),
            (NoteText::Plain(value), None) => Ok(StoredText::Plain { value }),
            (NoteText::Plain(value), Some(cipher)) => {
                let envelope = cipher
                    .seal(&value)
                    .map_err(|e| StorageError::IntegrityViolation(e.to_string()))?;
                Ok(StoredText::Sealed { envelope })
            }
        }
    }

    /// Convert stored text back to what clients see.
    ///
    /// Sealed text must open with the configured cipher; anything else is an
    /// integrity violation.
    pub fn open(&self, cipher: Option<&NoteCipher>) -> StorageResult<NoteText> {
        match self {
            StoredText::Plain { value } => Ok(NoteText::Plain(value.clone())),
            StoredText::Opaque { envelope } => Ok(NoteText::Encrypted(envelope.clone())),
            StoredText::Sealed { envelope } => {
                let cipher = cipher.ok_or_else(|| {
                    StorageError::IntegrityViolation(
                        "sealed note text but no note secret is configured".to_string(),
                    )
                })?;
                cipher
                    .open(envelope)
                    .map(NoteText::Plain)
                    .map_err(|e| StorageError::IntegrityViolation(e.to_string()))
            }
        }
    }
}

/// Note document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredNote {
    /// Unique note identifier (UUID)
    pub id: String,
    /// Owner user ID
    pub owner_user_id: String,
    pub title: StoredText,
    pub description: StoredText,
    pub tag: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub audio: Option<AudioAttachment>,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl super::super::OwnedResource for StoredNote {
    fn owner_user_id(&self) -> &str {
        &self.owner_user_id
    }

    fn is_public(&self) -> bool {
        self.is_public
    }
}

/// Repository for note operations on the document store.
pub struct NoteRepository<'a> {
    store: &'a DocumentStore,
}

impl<'a> NoteRepository<'a> {
    /// Create a new NoteRepository.
    pub fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }

    /// Get a note by ID.
    pub fn get(&self, note_id: &str) -> StorageResult<StoredNote> {
        let read_txn = self.store.db().begin_read()?;
        let table = read_txn.open_table(NOTES)?;
        match table.get(note_id)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(StorageError::NotFound(format!("Note {note_id}"))),
        }
    }

    /// Create a new note and its owner index entry.
    pub fn create(&self, note: &StoredNote) -> StorageResult<()> {
        let json = serde_json::to_vec(note)?;
        let key = make_owner_note_key(
            &note.owner_user_id,
            note.created_at.timestamp_millis(),
            &note.id,
        );

        let write_txn = self.store.db().begin_write()?;
        {
            let mut notes = write_txn.open_table(NOTES)?;
            if notes.get(note.id.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!("Note {}", note.id)));
            }
            notes.insert(note.id.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(OWNER_NOTES)?;
            index.insert(key.as_slice(), note.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Replace an existing note.
    ///
    /// Owner and creation time are part of the index key and cannot change.
    pub fn update(&self, note: &StoredNote) -> StorageResult<()> {
        let json = serde_json::to_vec(note)?;

        let write_txn = self.store.db().begin_write()?;
        {
            let mut notes = write_txn.open_table(NOTES)?;
            let existing: StoredNote = {
                let existing = notes
                    .get(note.id.as_str())?
                    .ok_or_else(|| StorageError::NotFound(format!("Note {}", note.id)))?;
                serde_json::from_slice(existing.value())?
            };

            if existing.owner_user_id != note.owner_user_id
                || existing.created_at != note.created_at
            {
                return Err(StorageError::PermissionDenied {
                    user_id: note.owner_user_id.clone(),
                    resource: format!("note {}", note.id),
                });
            }

            notes.insert(note.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Delete a note and its index entry.
    pub fn delete(&self, note_id: &str) -> StorageResult<()> {
        let write_txn = self.store.db().begin_write()?;
        {
            let mut notes = write_txn.open_table(NOTES)?;
            let existing: StoredNote = {
                let removed = notes
                    .remove(note_id)?
                    .ok_or_else(|| StorageError::NotFound(format!("Note {note_id}")))?;
                serde_json::from_slice(removed.value())?
            };

            let key = make_owner_note_key(
                &existing.owner_user_id,
                existing.created_at.timestamp_millis(),
                note_id,
            );
            let mut index = write_txn.open_table(OWNER_NOTES)?;
            index.remove(key.as_slice())?;
        }
        write_txn.commit()?;

        tracing::debug!(note_id = %note_id, "Note deleted");
        Ok(())
    }

    /// List all notes owned by a user, newest first.
    pub fn list_by_owner(&self, owner_user_id: &str) -> StorageResult<Vec<StoredNote>> {
        let read_txn = self.store.db().begin_read()?;
        let index = read_txn.open_table(OWNER_NOTES)?;
        let notes = read_txn.open_table(NOTES)?;

        let prefix = make_owner_prefix(owner_user_id);
        let mut results = Vec::new();

        for entry in index.range(prefix.as_slice()..)? {
            let (key, note_id) = entry?;
            if !key.value().starts_with(&prefix) {
                break;
            }

            match notes.get(note_id.value())? {
                Some(value) => results.push(serde_json::from_slice(value.value())?),
                None => tracing::warn!(
                    note_id = %note_id.value(),
                    "Owner index points at a missing note"
                ),
            }
        }

        Ok(results)
    }

    /// Fetch a note only if `owner_user_id` owns it.
    pub fn verify_ownership(
        &self,
        note_id: &str,
        owner_user_id: &str,
    ) -> StorageResult<StoredNote> {
        let note = self.get(note_id)?;

        if note.owner_user_id != owner_user_id {
            return Err(StorageError::PermissionDenied {
                user_id: owner_user_id.to_string(),
                resource: format!("note {note_id}"),
            });
        }

        Ok(note)
    }
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

    fn test_note(id: &str, owner: &str) -> StoredNote {
        let now = Utc::now();
        StoredNote {
            id: id.to_string(),
            owner_user_id: owner.to_string(),
            title: StoredText::Plain {
                value: "Hi".to_string(),
            },
            description: StoredText::Plain {
                value: "World".to_string(),
            },
            tag: "General".to_string(),
            images: Vec::new(),
            audio: None,
            is_public: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_and_get_note() {
        let (store, _dir) = test_store();
        let repo = NoteRepository::new(&store);

        let note = test_note("n-1", "user-1");
        repo.create(&note).unwrap();

        assert_eq!(repo.get("n-1").unwrap(), note);
    }

    #[test]
    fn list_by_owner_filters_and_orders_newest_first() {
        let (store, _dir) = test_store();
        let repo = NoteRepository::new(&store);
        let base = Utc::now();

        for i in 0..3 {
            let mut note = test_note(&format!("mine-{i}"), "user-1");
            note.created_at = base + Duration::seconds(i);
            repo.create(&note).unwrap();
        }
        repo.create(&test_note("theirs", "user-2")).unwrap();

        let mine = repo.list_by_owner("user-1").unwrap();
        let ids: Vec<_> = mine.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["mine-2", "mine-1", "mine-0"]);

        assert_eq!(repo.list_by_owner("user-2").unwrap().len(), 1);
        assert!(repo.list_by_owner("user-3").unwrap().is_empty());
    }

    #[test]
    fn delete_removes_note_and_index_entry() {
        let (store, _dir) = test_store();
        let repo = NoteRepository::new(&store);

        repo.create(&test_note("n-1", "user-1")).unwrap();
        repo.delete("n-1").unwrap();

        assert!(matches!(repo.get("n-1"), Err(StorageError::NotFound(_))));
        assert!(repo.list_by_owner("user-1").unwrap().is_empty());
        assert!(matches!(repo.delete("n-1"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn update_keeps_owner_fixed() {
        let (store, _dir) = test_store();
        let repo = NoteRepository::new(&store);

        let mut note = test_note("n-1", "user-1");
        repo.create(&note).unwrap();

        note.tag = "Work".to_string();
        repo.update(&note).unwrap();
        assert_eq!(repo.get("n-1").unwrap().tag, "Work");

        note.owner_user_id = "user-2".to_string();
        assert!(matches!(
            repo.update(&note),
            Err(StorageError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn verify_ownership_rejects_wrong_user() {
        let (store, _dir) = test_store();
        let repo = NoteRepository::new(&store);

        repo.create(&test_note("n-1", "user-1")).unwrap();

        assert!(repo.verify_ownership("n-1", "user-1").is_ok());
        assert!(matches!(
            repo.verify_ownership("n-1", "user-2"),
            Err(StorageError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn seal_and_open_with_cipher() {
        let cipher = NoteCipher::new("server-secret");

        let stored = StoredText::seal(NoteText::from("hello"), Some(&cipher)).unwrap();
        assert!(matches!(stored, StoredText::Sealed { .. }));
        assert_eq!(stored.open(Some(&cipher)).unwrap(), NoteText::from("hello"));

        // Without the cipher the sealed text cannot be read
        assert!(matches!(
            stored.open(None),
            Err(StorageError::IntegrityViolation(_))
        ));
    }

    #[test]
    fn client_envelopes_stay_opaque() {
        let cipher = NoteCipher::new("server-secret");
        let envelope = crate::crypto::encrypt("client side", "client-key").unwrap();

        let stored =
            StoredText::seal(NoteText::Encrypted(envelope.clone()), Some(&cipher)).unwrap();
        assert_eq!(stored, StoredText::Opaque { envelope: envelope.clone() });
        assert_eq!(
            stored.open(Some(&cipher)).unwrap(),
            NoteText::Encrypted(envelope)
        );
    }

    #[test]
    fn tampered_sealed_text_is_an_integrity_violation() {
        let cipher = NoteCipher::new("server-secret");
        let mut stored = StoredText::seal(NoteText::from("hello"), Some(&cipher)).unwrap();
        if let StoredText::Sealed { envelope } = &mut stored {
            envelope.tag = "00".repeat(16);
        }
        assert!(matches!(
            stored.open(Some(&cipher)),
            Err(StorageError::IntegrityViolation(_))
        ));
    }
}
