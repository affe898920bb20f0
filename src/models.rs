// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wire types shared between handlers and storage.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::crypto::Envelope;

/// Default tag for notes created without one.
pub const DEFAULT_NOTE_TAG: &str = "General";

/// Note title or description as sent by clients.
///
/// Either plain text or an envelope the client encrypted itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum NoteText {
    Encrypted(Envelope),
    Plain(String),
}

impl NoteText {
    /// Whether the text carries no content.
    ///
    /// Envelopes are never blank: their content is opaque.
    pub fn is_blank(&self) -> bool {
        match self {
            NoteText::Plain(text) => text.trim().is_empty(),
            NoteText::Encrypted(_) => false,
        }
    }
}

impl From<&str> for NoteText {
    fn from(value: &str) -> Self {
        NoteText::Plain(value.to_string())
    }
}

impl From<String> for NoteText {
    fn from(value: String) -> Self {
        NoteText::Plain(value)
    }
}

/// A single audio recording attached to a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AudioAttachment {
    pub url: String,
    /// Length in seconds.
    pub duration: f64,
}

/// Plain acknowledgement body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
