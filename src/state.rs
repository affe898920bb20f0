// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{CookieSettings, GitHubError, GitHubOAuth, SessionKeys};
use crate::config::Config;
use crate::crypto::NoteCipher;
use crate::storage::{DocumentStore, StorageError, StoragePaths, UploadStore};

/// Failure while assembling [`AppState`] at startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    GitHub(#[from] GitHubError),
}

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub uploads: UploadStore,
    pub sessions: Arc<SessionKeys>,
    pub cookies: CookieSettings,
    /// At-rest sealing of plain note text; `None` stores plain text as-is.
    pub note_cipher: Option<Arc<NoteCipher>>,
    /// `None` when GitHub sign-in is not configured.
    pub github: Option<Arc<GitHubOAuth>>,
    /// Where the browser lands after GitHub sign-in.
    pub frontend_url: String,
    /// Credentialed CORS origin; permissive CORS when `None`.
    pub cors_origin: Option<String>,
}

impl AppState {
    pub fn new(store: DocumentStore, uploads: UploadStore, sessions: SessionKeys) -> Self {
        let cookies = CookieSettings {
            secure: false,
            max_age_secs: sessions.ttl_secs(),
        };
        Self {
            store: Arc::new(store),
            uploads,
            sessions: Arc::new(sessions),
            cookies,
            note_cipher: None,
            github: None,
            frontend_url: "/".to_string(),
            cors_origin: None,
        }
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.cookies.secure = secure;
        self
    }

    pub fn with_note_cipher(mut self, cipher: NoteCipher) -> Self {
        self.note_cipher = Some(Arc::new(cipher));
        self
    }

    pub fn with_github(mut self, github: GitHubOAuth) -> Self {
        self.github = Some(Arc::new(github));
        self
    }

    pub fn with_frontend_url(mut self, url: impl Into<String>) -> Self {
        self.frontend_url = url.into();
        self
    }

    pub fn with_cors_origin(mut self, origin: Option<String>) -> Self {
        self.cors_origin = origin;
        self
    }

    /// Open storage and build every component from configuration.
    pub fn from_config(config: &Config) -> Result<Self, StartupError> {
        let paths = StoragePaths::new(&config.data_dir);

        let store = DocumentStore::open(&paths.database())?;
        let uploads = UploadStore::new(paths);
        uploads.initialize()?;

        let sessions = SessionKeys::new(&config.jwt_secret, config.session_ttl_secs);

        let mut state = AppState::new(store, uploads, sessions)
            .with_secure_cookies(config.cookie_secure)
            .with_frontend_url(config.frontend_url.clone())
            .with_cors_origin(config.cors_origin.clone());

        if let Some(secret) = &config.note_secret {
            state = state.with_note_cipher(NoteCipher::new(secret));
        }
        if let Some(github) = &config.github {
            state = state.with_github(GitHubOAuth::new(github)?);
        }

        Ok(state)
    }

    /// Sealing cipher, if configured.
    pub fn note_cipher(&self) -> Option<&NoteCipher> {
        self.note_cipher.as_deref()
    }
}

/// State over a scratch data directory, for tests.
#[cfg(test)]
pub fn test_state() -> (AppState, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let paths = StoragePaths::new(dir.path());
    let store = DocumentStore::open(&paths.database()).expect("Failed to open store");
    let uploads = UploadStore::new(paths);
    uploads.initialize().expect("Failed to create upload dir");
    let sessions = SessionKeys::new(b"test-secret-test-secret-test-secret!", 3600);
    (AppState::new(store, uploads, sessions), dir)
}
