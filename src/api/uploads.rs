// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File upload endpoints.
//!
//! Multipart uploads for note images, voice memos and attachments. Files are
//! written to the local upload directory and served back under `/uploads`.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::{StoredUpload, UploadKind},
};

/// Largest accepted multipart body.
pub const MAX_UPLOAD_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Most files accepted by one attachments request.
pub const MAX_ATTACHMENTS: usize = 5;

/// Response after uploading a voice memo.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AudioUploadResponse {
    pub url: String,
    pub file_name: String,
    pub size: usize,
    /// Length in seconds, as reported by the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// Response after uploading attachments.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttachmentsResponse {
    /// Stored files in the order they were sent.
    pub files: Vec<StoredUpload>,
}

/// A file part read from a multipart body.
struct FilePart {
    content_type: String,
    data: Vec<u8>,
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::new(e.status(), format!("Invalid multipart body: {}", e.body_text()))
}

async fn read_file(field: axum::extract::multipart::Field<'_>) -> Result<FilePart, ApiError> {
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = field.bytes().await.map_err(multipart_error)?.to_vec();
    Ok(FilePart { content_type, data })
}

fn parse_duration(raw: &str) -> Result<f64, ApiError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| ApiError::bad_request("Duration must be a non-negative number"))
}

/// Upload a single image.
#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "Uploads",
    security(("cookie_auth" = [])),
    request_body(content_type = "multipart/form-data", description = "Field `file`: png, jpeg, gif or webp, up to 5 MiB"),
    responses(
        (status = 201, description = "Image stored", body = StoredUpload),
        (status = 400, description = "Missing file or unsupported type"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "File too large")
    )
)]
pub async fn upload_image(
    Auth(user): Auth,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredUpload>), ApiError> {
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") && file.is_none() {
            file = Some(read_file(field).await?);
        }
    }

    let file = file.ok_or_else(|| ApiError::bad_request("No file uploaded. Use field name 'file'."))?;
    let upload = state
        .uploads
        .save(UploadKind::Image, &file.content_type, &file.data)
        .await?;

    tracing::info!(user_id = %user.user_id, file_name = %upload.file_name, "Image uploaded");

    Ok((StatusCode::CREATED, Json(upload)))
}

/// Upload a voice memo.
#[utoipa::path(
    post,
    path = "/api/upload/audio",
    tag = "Uploads",
    security(("cookie_auth" = [])),
    request_body(content_type = "multipart/form-data", description = "Field `audio`: mpeg, wav, webm, ogg or mp4, up to 10 MiB; optional field `duration` in seconds"),
    responses(
        (status = 201, description = "Audio stored", body = AudioUploadResponse),
        (status = 400, description = "Missing file, unsupported type or bad duration"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "File too large")
    )
)]
pub async fn upload_audio(
    Auth(user): Auth,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AudioUploadResponse>), ApiError> {
    let mut file = None;
    let mut duration = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("audio") if file.is_none() => file = Some(read_file(field).await?),
            Some("duration") => {
                let raw = field.text().await.map_err(multipart_error)?;
                if !raw.trim().is_empty() {
                    duration = Some(parse_duration(&raw)?);
                }
            }
            _ => {}
        }
    }

    let file =
        file.ok_or_else(|| ApiError::bad_request("No audio uploaded. Use field name 'audio'."))?;
    let upload = state
        .uploads
        .save(UploadKind::Audio, &file.content_type, &file.data)
        .await?;

    tracing::info!(user_id = %user.user_id, file_name = %upload.file_name, "Audio uploaded");

    Ok((
        StatusCode::CREATED,
        Json(AudioUploadResponse {
            url: upload.url,
            file_name: upload.file_name,
            size: upload.size,
            duration,
        }),
    ))
}

/// Upload up to five attachments at once.
///
/// Files are written concurrently. If any file is rejected, the ones already
/// written are removed and nothing is returned.
#[utoipa::path(
    post,
    path = "/api/upload/attachments",
    tag = "Uploads",
    security(("cookie_auth" = [])),
    request_body(content_type = "multipart/form-data", description = "Repeated field `files`: images, audio, pdf or plain text, up to 10 MiB each"),
    responses(
        (status = 201, description = "Attachments stored", body = AttachmentsResponse),
        (status = 400, description = "No files, too many files or unsupported type"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "File too large")
    )
)]
pub async fn upload_attachments(
    Auth(user): Auth,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AttachmentsResponse>), ApiError> {
    let mut parts = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if matches!(field.name(), Some("files") | Some("files[]")) {
            if parts.len() == MAX_ATTACHMENTS {
                return Err(ApiError::bad_request(format!(
                    "At most {MAX_ATTACHMENTS} files per upload"
                )));
            }
            parts.push(read_file(field).await?);
        }
    }

    if parts.is_empty() {
        return Err(ApiError::bad_request("No files uploaded. Use field name 'files'."));
    }

    let count = parts.len();
    let mut tasks = JoinSet::new();
    for (index, part) in parts.into_iter().enumerate() {
        let uploads = state.uploads.clone();
        tasks.spawn(async move {
            let result = uploads
                .save(UploadKind::Attachment, &part.content_type, &part.data)
                .await;
            (index, result)
        });
    }

    let mut stored = Vec::with_capacity(count);
    let mut failure: Option<ApiError> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(upload))) => stored.push((index, upload)),
            Ok((_, Err(e))) => {
                failure.get_or_insert(e.into());
            }
            Err(e) => {
                failure.get_or_insert_with(|| ApiError::internal(e));
            }
        }
    }

    if let Some(err) = failure {
        for (_, upload) in &stored {
            if let Err(e) = state.uploads.remove(&upload.file_name).await {
                tracing::warn!(file_name = %upload.file_name, error = %e, "Failed to remove partial upload");
            }
        }
        return Err(err);
    }

    stored.sort_by_key(|(index, _)| *index);
    let files: Vec<StoredUpload> = stored.into_iter().map(|(_, upload)| upload).collect();

    tracing::info!(user_id = %user.user_id, count = files.len(), "Attachments uploaded");

    Ok((StatusCode::CREATED, Json(AttachmentsResponse { files })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthenticatedUser;
    use crate::state::test_state;
    use axum::{
        body::Body,
        extract::{FromRequest, Request},
    };

    const BOUNDARY: &str = "savebook-test-boundary";

    /// (field name, optional (file name, content type), data)
    type Part<'a> = (&'a str, Option<(&'a str, &'a str)>, &'a [u8]);

    async fn multipart(parts: &[Part<'_>]) -> Multipart {
        let mut body = Vec::new();
        for (name, file, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file {
                Some((file_name, content_type)) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let req = Request::builder()
            .method("POST")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(req, &()).await.unwrap()
    }

    fn auth() -> Auth {
        Auth(AuthenticatedUser {
            user_id: "alice".to_string(),
            expires_at: 0,
        })
    }

    #[tokio::test]
    async fn image_upload_returns_servable_url() {
        let (state, _dir) = test_state();
        let form = multipart(&[("file", Some(("cat.png", "image/png")), b"\x89PNG data")]).await;

        let (status, Json(upload)) = upload_image(auth(), State(state.clone()), form)
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(upload.url.starts_with("/uploads/"));
        assert!(upload.url.ends_with(".png"));
        assert!(state.uploads.exists(&upload.file_name));
    }

    #[tokio::test]
    async fn image_upload_rejects_missing_field_and_wrong_type() {
        let (state, _dir) = test_state();

        let form = multipart(&[("other", None, b"x")]).await;
        let err = upload_image(auth(), State(state.clone()), form).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let form = multipart(&[("file", Some(("a.html", "text/html")), b"<p>")]).await;
        let err = upload_image(auth(), State(state), form).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn audio_upload_carries_duration() {
        let (state, _dir) = test_state();
        let form = multipart(&[
            ("audio", Some(("memo.webm", "audio/webm")), b"webm bytes"),
            ("duration", None, b"12.5"),
        ])
        .await;

        let (status, Json(upload)) = upload_audio(auth(), State(state), form).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(upload.url.ends_with(".webm"));
        assert_eq!(upload.duration, Some(12.5));
    }

    #[tokio::test]
    async fn audio_upload_rejects_negative_duration() {
        let (state, _dir) = test_state();
        let form = multipart(&[
            ("audio", Some(("memo.ogg", "audio/ogg")), b"ogg"),
            ("duration", None, b"-3"),
        ])
        .await;

        let err = upload_audio(auth(), State(state), form).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn attachments_are_stored_in_order() {
        let (state, _dir) = test_state();
        let form = multipart(&[
            ("files", Some(("a.pdf", "application/pdf")), b"%PDF-1.7"),
            ("files", Some(("b.txt", "text/plain")), b"hello"),
            ("files", Some(("c.png", "image/png")), b"png"),
        ])
        .await;

        let (status, Json(response)) = upload_attachments(auth(), State(state), form)
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        let extensions: Vec<_> = response
            .files
            .iter()
            .map(|f| f.file_name.rsplit('.').next().unwrap().to_string())
            .collect();
        assert_eq!(extensions, ["pdf", "txt", "png"]);
    }

    #[tokio::test]
    async fn attachments_reject_too_many_files() {
        let (state, _dir) = test_state();
        let part: Part = ("files", Some(("a.txt", "text/plain")), b"x");
        let form = multipart(&[part; MAX_ATTACHMENTS + 1]).await;

        let err = upload_attachments(auth(), State(state), form).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rejected_attachment_rolls_back_the_batch() {
        let (state, _dir) = test_state();
        let form = multipart(&[
            ("files", Some(("ok.txt", "text/plain")), b"fine"),
            ("files", Some(("bad.exe", "application/x-msdownload")), b"MZ"),
        ])
        .await;

        let err = upload_attachments(auth(), State(state.clone()), form)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let remaining = std::fs::read_dir(state.uploads.dir()).unwrap().count();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn attachments_require_at_least_one_file() {
        let (state, _dir) = test_state();
        let form = multipart(&[("note", None, b"no files here")]).await;

        let err = upload_attachments(auth(), State(state), form).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
