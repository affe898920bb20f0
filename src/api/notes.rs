// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Note API endpoints.
//!
//! All operations require authentication. Writes are owner-only; reads are
//! allowed for the owner and, when the note is public, for any signed-in
//! user.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    api::validation::{is_media_url, ValidatedJson},
    auth::Auth,
    crypto::NoteCipher,
    error::ApiError,
    models::{AudioAttachment, NoteText, DEFAULT_NOTE_TAG},
    state::AppState,
    storage::{NoteRepository, OwnershipEnforcer, StorageError, StoredNote, StoredText},
};

/// Maximum number of images on one note.
pub const MAX_NOTE_IMAGES: usize = 10;

/// A note as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub owner_id: String,
    pub title: NoteText,
    pub description: NoteText,
    pub tag: String,
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioAttachment>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Open a stored note for display.
    pub fn from_stored(note: StoredNote, cipher: Option<&NoteCipher>) -> Result<Self, StorageError> {
        let title = note.title.open(cipher)?;
        let description = note.description.open(cipher)?;
        Ok(Self {
            id: note.id,
            owner_id: note.owner_user_id,
            title,
            description,
            tag: note.tag,
            images: note.images,
            audio: note.audio,
            is_public: note.is_public,
            created_at: note.created_at,
            updated_at: note.updated_at,
        })
    }
}

/// Request to create a note.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    /// Plain text or a client-encrypted envelope.
    pub title: NoteText,
    pub description: NoteText,
    /// Defaults to "General".
    #[validate(length(max = 30, message = "Tag must be at most 30 characters"))]
    pub tag: Option<String>,
    #[serde(default)]
    #[validate(length(max = 10, message = "A note can have at most 10 images"))]
    pub images: Vec<String>,
    #[serde(default)]
    pub audio: Option<AudioAttachment>,
    #[serde(default)]
    pub is_public: bool,
}

/// Partial note update. Omitted fields are left alone.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteRequest {
    pub title: Option<NoteText>,
    pub description: Option<NoteText>,
    #[validate(length(max = 30, message = "Tag must be at most 30 characters"))]
    pub tag: Option<String>,
    #[validate(length(max = 10, message = "A note can have at most 10 images"))]
    pub images: Option<Vec<String>>,
    pub audio: Option<AudioAttachment>,
    /// Drop the audio attachment.
    #[serde(default)]
    pub remove_audio: bool,
}

/// Request to publish or unpublish a note.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShareNoteRequest {
    pub is_public: bool,
}

/// Query parameters for listing notes.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct NoteListQuery {
    /// Only return notes with this tag.
    pub tag: Option<String>,
}

/// Response containing a list of notes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoteListResponse {
    /// Notes owned by the user, newest first.
    pub notes: Vec<Note>,
    /// Total count of notes returned.
    pub total: usize,
}

/// Response after creating or updating a note.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoteResponse {
    pub message: String,
    pub note: Note,
}

/// Response after deleting a note.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteNoteResponse {
    pub message: String,
    /// The ID of the deleted note.
    pub id: String,
}

/// Response after changing a note's visibility.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShareNoteResponse {
    pub message: String,
    pub note: Note,
    /// Public URL path, present while the note is public.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_path: Option<String>,
}

fn require_text(field: &str, text: &NoteText) -> Result<(), ApiError> {
    if text.is_blank() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(())
}

fn check_images(images: &[String]) -> Result<(), ApiError> {
    if images.len() > MAX_NOTE_IMAGES {
        return Err(ApiError::bad_request(format!(
            "A note can have at most {MAX_NOTE_IMAGES} images"
        )));
    }
    if images.iter().any(|url| !is_media_url(url)) {
        return Err(ApiError::bad_request("Image URLs must be http(s) or /uploads paths"));
    }
    Ok(())
}

fn check_audio(audio: &AudioAttachment) -> Result<(), ApiError> {
    if !is_media_url(&audio.url) {
        return Err(ApiError::bad_request("Audio URL must be http(s) or an /uploads path"));
    }
    if !audio.duration.is_finite() || audio.duration < 0.0 {
        return Err(ApiError::bad_request("Audio duration must be a non-negative number"));
    }
    Ok(())
}

fn normalize_tag(tag: Option<&str>) -> String {
    tag.map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_NOTE_TAG)
        .to_string()
}

fn not_found_as(e: StorageError) -> ApiError {
    match e {
        StorageError::NotFound(_) => ApiError::not_found("Note not found"),
        other => other.into(),
    }
}

/// Load a note the caller owns. Unknown → 404, foreign → 403.
fn load_owned(state: &AppState, note_id: &str, user_id: &str) -> Result<StoredNote, ApiError> {
    NoteRepository::new(&state.store)
        .verify_ownership(note_id, user_id)
        .map_err(not_found_as)
}

/// List the caller's notes, newest first.
#[utoipa::path(
    get,
    path = "/api/notes",
    tag = "Notes",
    security(("cookie_auth" = [])),
    params(NoteListQuery),
    responses(
        (status = 200, description = "Notes owned by the user", body = NoteListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_notes(
    Auth(user): Auth,
    State(state): State<AppState>,
    Query(query): Query<NoteListQuery>,
) -> Result<Json<NoteListResponse>, ApiError> {
    let tag = query.tag.as_deref().map(str::trim).filter(|t| !t.is_empty());

    let notes = NoteRepository::new(&state.store)
        .list_by_owner(&user.user_id)?
        .into_iter()
        .filter(|note| tag.is_none_or(|tag| note.tag == tag))
        .map(|note| Note::from_stored(note, state.note_cipher()))
        .collect::<Result<Vec<_>, _>>()?;

    let total = notes.len();
    Ok(Json(NoteListResponse { notes, total }))
}

/// Create a note owned by the caller.
#[utoipa::path(
    post,
    path = "/api/notes",
    tag = "Notes",
    security(("cookie_auth" = [])),
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Note created", body = NoteResponse),
        (status = 400, description = "Invalid note"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_note(
    Auth(user): Auth,
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateNoteRequest>,
) -> Result<(StatusCode, Json<NoteResponse>), ApiError> {
    require_text("Title", &request.title)?;
    require_text("Description", &request.description)?;
    check_images(&request.images)?;
    if let Some(audio) = &request.audio {
        check_audio(audio)?;
    }

    let cipher = state.note_cipher();
    let now = Utc::now();
    let note = StoredNote {
        id: uuid::Uuid::new_v4().to_string(),
        owner_user_id: user.user_id.clone(),
        title: StoredText::seal(request.title, cipher)?,
        description: StoredText::seal(request.description, cipher)?,
        tag: normalize_tag(request.tag.as_deref()),
        images: request.images,
        audio: request.audio,
        is_public: request.is_public,
        created_at: now,
        updated_at: now,
    };

    NoteRepository::new(&state.store).create(&note)?;

    tracing::info!(user_id = %user.user_id, note_id = %note.id, "Note created");

    Ok((
        StatusCode::CREATED,
        Json(NoteResponse {
            message: "Note created successfully".to_string(),
            note: Note::from_stored(note, cipher)?,
        }),
    ))
}

/// Get a note by ID.
///
/// Owners always see their notes; other signed-in users only see public ones.
#[utoipa::path(
    get,
    path = "/api/notes/{id}",
    tag = "Notes",
    security(("cookie_auth" = [])),
    params(("id" = String, Path, description = "Note ID")),
    responses(
        (status = 200, description = "Note", body = Note),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Note belongs to another user and is private"),
        (status = 404, description = "Note not found")
    )
)]
pub async fn get_note(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(note_id): Path<String>,
) -> Result<Json<Note>, ApiError> {
    let note = NoteRepository::new(&state.store)
        .get(&note_id)
        .map_err(not_found_as)?;

    note.verify_read_access(Some(&user))
        .map_err(|_| ApiError::forbidden("You don't have permission to view this note"))?;

    Ok(Json(Note::from_stored(note, state.note_cipher())?))
}

/// Update a note the caller owns.
#[utoipa::path(
    put,
    path = "/api/notes/{id}",
    tag = "Notes",
    security(("cookie_auth" = [])),
    params(("id" = String, Path, description = "Note ID")),
    request_body = UpdateNoteRequest,
    responses(
        (status = 200, description = "Note updated", body = NoteResponse),
        (status = 400, description = "Invalid note"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Note not found")
    )
)]
pub async fn update_note(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(note_id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateNoteRequest>,
) -> Result<Json<NoteResponse>, ApiError> {
    let mut note = load_owned(&state, &note_id, &user.user_id)?;
    let cipher = state.note_cipher();

    if let Some(title) = request.title {
        require_text("Title", &title)?;
        note.title = StoredText::seal(title, cipher)?;
    }
    if let Some(description) = request.description {
        require_text("Description", &description)?;
        note.description = StoredText::seal(description, cipher)?;
    }
    if let Some(tag) = request.tag.as_deref() {
        note.tag = normalize_tag(Some(tag));
    }
    if let Some(images) = request.images {
        check_images(&images)?;
        note.images = images;
    }
    if request.remove_audio {
        note.audio = None;
    } else if let Some(audio) = request.audio {
        check_audio(&audio)?;
        note.audio = Some(audio);
    }
    note.updated_at = Utc::now();

    NoteRepository::new(&state.store).update(&note)?;

    tracing::info!(user_id = %user.user_id, note_id = %note_id, "Note updated");

    Ok(Json(NoteResponse {
        message: "Note updated successfully".to_string(),
        note: Note::from_stored(note, cipher)?,
    }))
}

/// Delete a note the caller owns.
#[utoipa::path(
    delete,
    path = "/api/notes/{id}",
    tag = "Notes",
    security(("cookie_auth" = [])),
    params(("id" = String, Path, description = "Note ID")),
    responses(
        (status = 200, description = "Note deleted", body = DeleteNoteResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Note not found")
    )
)]
pub async fn delete_note(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(note_id): Path<String>,
) -> Result<Json<DeleteNoteResponse>, ApiError> {
    load_owned(&state, &note_id, &user.user_id)?;

    NoteRepository::new(&state.store)
        .delete(&note_id)
        .map_err(not_found_as)?;

    tracing::info!(user_id = %user.user_id, note_id = %note_id, "Note deleted");

    Ok(Json(DeleteNoteResponse {
        message: "Note deleted successfully".to_string(),
        id: note_id,
    }))
}

/// Publish or unpublish a note the caller owns.
#[utoipa::path(
    put,
    path = "/api/notes/share/{id}",
    tag = "Notes",
    security(("cookie_auth" = [])),
    params(("id" = String, Path, description = "Note ID")),
    request_body = ShareNoteRequest,
    responses(
        (status = 200, description = "Visibility changed", body = ShareNoteResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Note not found")
    )
)]
pub async fn share_note(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(note_id): Path<String>,
    ValidatedJson(request): ValidatedJson<ShareNoteRequest>,
) -> Result<Json<ShareNoteResponse>, ApiError> {
    let mut note = load_owned(&state, &note_id, &user.user_id)?;

    note.is_public = request.is_public;
    note.updated_at = Utc::now();
    NoteRepository::new(&state.store).update(&note)?;

    tracing::info!(
        user_id = %user.user_id,
        note_id = %note_id,
        is_public = request.is_public,
        "Note visibility changed"
    );

    let (message, share_path) = if request.is_public {
        ("Note is now public", Some(format!("/api/public/notes/{note_id}")))
    } else {
        ("Note is now private", None)
    };

    Ok(Json(ShareNoteResponse {
        message: message.to_string(),
        note: Note::from_stored(note, state.note_cipher())?,
        share_path,
    }))
}
