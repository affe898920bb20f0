// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Unauthenticated read-only view of public notes.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::OptionalAuth,
    error::ApiError,
    models::{AudioAttachment, NoteText},
    state::AppState,
    storage::{NoteRepository, OwnershipEnforcer, StorageError, UserRepository},
};

/// Author shown next to a public note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicAuthor {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// A public note as shown to anyone holding the link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicNote {
    pub id: String,
    pub title: NoteText,
    pub description: NoteText,
    pub tag: String,
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioAttachment>,
    /// `None` if the author account no longer exists.
    pub author: Option<PublicAuthor>,
    /// Whether the viewer is signed in as the author.
    pub is_owner: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Get a public note.
///
/// Private and unknown notes are both reported as not found.
#[utoipa::path(
    get,
    path = "/api/public/notes/{id}",
    tag = "Public",
    params(("id" = String, Path, description = "Note ID")),
    responses(
        (status = 200, description = "Public note", body = PublicNote),
        (status = 404, description = "Note not found or not public")
    )
)]
pub async fn get_public_note(
    OptionalAuth(viewer): OptionalAuth,
    State(state): State<AppState>,
    Path(note_id): Path<String>,
) -> Result<Json<PublicNote>, ApiError> {
    let note = match NoteRepository::new(&state.store).get(&note_id) {
        Ok(note) => note,
        Err(StorageError::NotFound(_)) => return Err(ApiError::not_found("Note not found")),
        Err(e) => return Err(e.into()),
    };

    // Anonymous access check: only the public flag counts here
    if note.verify_read_access(None).is_err() {
        return Err(ApiError::not_found("Note not found"));
    }

    let author = match UserRepository::new(&state.store).get(&note.owner_user_id) {
        Ok(user) => Some(PublicAuthor {
            username: user.username,
            name: user.name,
            avatar_url: user.avatar_url,
        }),
        Err(StorageError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };

    let cipher = state.note_cipher();
    let is_owner = viewer.is_some_and(|v| v.user_id == note.owner_user_id);

    Ok(Json(PublicNote {
        title: note.title.open(cipher)?,
        description: note.description.open(cipher)?,
        id: note.id,
        tag: note.tag,
        images: note.images,
        audio: note.audio,
        author,
        is_owner,
        created_at: note.created_at,
        updated_at: note.updated_at,
    }))
}
