// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Uploaded file storage on the local filesystem.
//!
//! Files are written under `$DATA_DIR/uploads/` with a random UUID name and an
//! extension derived from the declared content type. The original file name
//! is never used on disk. Files are served back under [`UPLOADS_URL_PREFIX`].

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{StoragePaths, StorageError, StorageResult};

/// URL path under which uploaded files are served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

const MIB: usize = 1024 * 1024;

/// What an upload is for; decides accepted types and size limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Audio,
    Attachment,
}

impl UploadKind {
    /// Maximum accepted size in bytes.
    pub fn max_bytes(self) -> usize {
        match self {
            UploadKind::Image => 5 * MIB,
            UploadKind::Audio | UploadKind::Attachment => 10 * MIB,
        }
    }

    /// File extension for an accepted content type, or `None` if rejected.
    pub fn extension_for(self, content_type: &str) -> Option<&'static str> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let image = match essence.as_str() {
            "image/png" => Some("png"),
            "image/jpeg" | "image/jpg" => Some("jpg"),
            "image/gif" => Some("gif"),
            "image/webp" => Some("webp"),
            _ => None,
        };
        let audio = match essence.as_str() {
            "audio/mpeg" | "audio/mp3" => Some("mp3"),
            "audio/wav" | "audio/wave" | "audio/x-wav" => Some("wav"),
            "audio/webm" => Some("webm"),
            "audio/ogg" => Some("ogg"),
            "audio/mp4" | "audio/x-m4a" => Some("m4a"),
            _ => None,
        };
        let document = match essence.as_str() {
            "application/pdf" => Some("pdf"),
            "text/plain" => Some("txt"),
            _ => None,
        };

        match self {
            UploadKind::Image => image,
            UploadKind::Audio => audio,
            UploadKind::Attachment => image.or(audio).or(document),
        }
    }

    fn label(self) -> &'static str {
        match self {
            UploadKind::Image => "image",
            UploadKind::Audio => "audio",
            UploadKind::Attachment => "attachment",
        }
    }
}

/// Error type for upload operations.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Unsupported {kind} type: {content_type}")]
    UnsupportedType {
        kind: &'static str,
        content_type: String,
    },

    #[error("File exceeds the {max_mib} MiB limit")]
    TooLarge { max_mib: usize },

    #[error("File is empty")]
    Empty,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<std::io::Error> for UploadError {
    fn from(e: std::io::Error) -> Self {
        UploadError::Storage(StorageError::Io(e))
    }
}

/// A file written to the upload directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredUpload {
    /// Public URL path of the file.
    pub url: String,
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
}

/// Upload directory manager.
#[derive(Debug, Clone)]
pub struct UploadStore {
    paths: StoragePaths,
}

impl UploadStore {
    pub fn new(paths: StoragePaths) -> Self {
        Self { paths }
    }

    /// Directory served under [`UPLOADS_URL_PREFIX`].
    pub fn dir(&self) -> PathBuf {
        self.paths.uploads_dir()
    }

    /// Create the upload directory. Safe to call multiple times.
    pub fn initialize(&self) -> StorageResult<()> {
        fs::create_dir_all(self.dir())?;
        Ok(())
    }

    /// Check the upload directory exists and is a directory.
    pub fn health_check(&self) -> StorageResult<()> {
        if self.dir().is_dir() {
            Ok(())
        } else {
            Err(StorageError::NotFound(format!(
                "Upload directory {}",
                self.dir().display()
            )))
        }
    }

    /// Validate and write one file.
    pub async fn save(
        &self,
        kind: UploadKind,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredUpload, UploadError> {
        let extension =
            kind.extension_for(content_type)
                .ok_or_else(|| UploadError::UnsupportedType {
                    kind: kind.label(),
                    content_type: content_type.to_string(),
                })?;

        if data.is_empty() {
            return Err(UploadError::Empty);
        }
        if data.len() > kind.max_bytes() {
            return Err(UploadError::TooLarge {
                max_mib: kind.max_bytes() / MIB,
            });
        }

        let file_name = format!("{}.{extension}", uuid::Uuid::new_v4());
        let path = self.paths.upload(&file_name);

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension(format!("{extension}.tmp"));
        tokio::fs::write(&temp_path, data).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        tracing::debug!(file_name = %file_name, size = data.len(), "Upload stored");

        Ok(StoredUpload {
            url: format!("{UPLOADS_URL_PREFIX}/{file_name}"),
            file_name,
            content_type: content_type.to_string(),
            size: data.len(),
        })
    }

    /// Remove an uploaded file. Missing files are not an error.
    pub async fn remove(&self, file_name: &str) -> StorageResult<()> {
        match tokio::fs::remove_file(self.paths.upload(file_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if an uploaded file exists.
    pub fn exists(&self, file_name: &str) -> bool {
        self.paths.upload(file_name).is_file()
    }
}
