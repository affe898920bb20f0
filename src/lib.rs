// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Savebook - Note-taking API Service
//!
//! JSON API for personal notes with cookie-borne JWT sessions, optional GitHub
//! sign-in, shareable public notes and media uploads.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Sessions, passwords and GitHub OAuth
//! - `crypto` - AES-GCM note envelopes
//! - `storage` - Embedded document store (redb) and upload directory
//! - `sweeper` - Background cleanup of abandoned GitHub logins

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
pub mod sweeper;
