// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Note content encryption (AES-256-GCM envelopes)
//!
//! Note titles and descriptions may travel and rest as an [`Envelope`]: the
//! `{iv, content, tag}` triple produced by AES-256-GCM, each part hex encoded.
//!
//! | Function | Purpose |
//! |----------|---------|
//! | [`encrypt`] | Encrypts a UTF-8 string under `SHA-256(secret)` with a fresh random 12-byte nonce. |
//! | [`decrypt`] | Verifies the tag and returns the plaintext. Any altered byte fails. |
//! | [`NoteCipher`] | Holds a derived key for sealing note text at rest on the server. |
//!
//! Clients may encrypt with their own secret before sending a note; those
//! envelopes are opaque to the server and stored unchanged.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("envelope field `{0}` is not valid hex")]
    InvalidEncoding(&'static str),

    #[error("envelope nonce must be {NONCE_LEN} bytes, got {0}")]
    InvalidNonceLength(usize),

    #[error("envelope tag must be {TAG_LEN} bytes, got {0}")]
    InvalidTagLength(usize),

    #[error("encryption failed")]
    EncryptionFailed,

    /// Wrong key, or the ciphertext/tag/nonce was altered.
    #[error("authentication failed: envelope was tampered with or the key is wrong")]
    AuthenticationFailed,

    #[error("decrypted content is not valid UTF-8")]
    InvalidUtf8,
}

/// Authenticated ciphertext with its nonce and tag, all hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Envelope {
    /// 12-byte nonce.
    pub iv: String,
    /// Ciphertext without the tag.
    pub content: String,
    /// 16-byte GCM tag.
    pub tag: String,
}

/// Derive the 256-bit AES key by hashing the secret.
fn derive_key(secret: &str) -> [u8; 32] {
    let digest = Sha256::digest(secret.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

fn seal_with_key(key: &[u8; 32], plaintext: &str) -> Result<Envelope, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::EncryptionFailed)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut sealed = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::EncryptionFailed)?;

    // aes-gcm appends the tag to the ciphertext
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(Envelope {
        iv: hex::encode(nonce_bytes),
        content: hex::encode(sealed),
        tag: hex::encode(tag),
    })
}

fn open_with_key(key: &[u8; 32], envelope: &Envelope) -> Result<String, CryptoError> {
    let iv = hex::decode(&envelope.iv).map_err(|_| CryptoError::InvalidEncoding("iv"))?;
    let mut content =
        hex::decode(&envelope.content).map_err(|_| CryptoError::InvalidEncoding("content"))?;
    let tag = hex::decode(&envelope.tag).map_err(|_| CryptoError::InvalidEncoding("tag"))?;

    if iv.len() != NONCE_LEN {
        return Err(CryptoError::InvalidNonceLength(iv.len()));
    }
    if tag.len() != TAG_LEN {
        return Err(CryptoError::InvalidTagLength(tag.len()));
    }

    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::AuthenticationFailed)?;
    content.extend_from_slice(&tag);

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), content.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
}

/// Encrypt `plaintext` under a key derived from `secret`.
pub fn encrypt(plaintext: &str, secret: &str) -> Result<Envelope, CryptoError> {
    seal_with_key(&derive_key(secret), plaintext)
}

/// Decrypt an envelope produced by [`encrypt`] with the same secret.
pub fn decrypt(envelope: &Envelope, secret: &str) -> Result<String, CryptoError> {
    open_with_key(&derive_key(secret), envelope)
}

/// Server-side cipher for sealing plain note text at rest.
///
/// The key is derived once from `NOTE_ENCRYPTION_SECRET`.
#[derive(Clone)]
pub struct NoteCipher {
    key: [u8; 32],
}

impl NoteCipher {
    pub fn new(secret: &str) -> Self {
        Self {
            key: derive_key(secret),
        }
    }

    pub fn seal(&self, plaintext: &str) -> Result<Envelope, CryptoError> {
        seal_with_key(&self.key, plaintext)
    }

    pub fn open(&self, envelope: &Envelope) -> Result<String, CryptoError> {
        open_with_key(&self.key, envelope)
    }
}

impl std::fmt::Debug for NoteCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteCipher").finish_non_exhaustive()
    }
}
