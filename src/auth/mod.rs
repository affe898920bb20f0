// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Username/password accounts, GitHub sign-in and cookie-carried sessions.
//!
//! ## Auth Flow
//!
//! 1. User registers (`POST /api/auth/register`); the password is stored as a
//!    bcrypt hash.
//! 2. User logs in with username/password or through GitHub OAuth.
//! 3. Server signs an HS256 JWT `{sub, iat, exp}` and sets it in the
//!    `authToken` cookie (`HttpOnly`, `SameSite=Strict`).
//! 4. Protected handlers take the [`Auth`] extractor, which verifies the
//!    cookie (or an `Authorization: Bearer` header) on every request.
//!
//! ## Security
//!
//! - All note, profile and upload endpoints require a session
//! - Sessions are stateless; logout clears the cookie
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod cookie;
pub mod error;
pub mod extractor;
pub mod github;
pub mod password;
pub mod session;

pub use claims::{AuthenticatedUser, SessionClaims};
pub use cookie::{CookieSettings, SESSION_COOKIE};
pub use error::AuthError;
pub use extractor::{Auth, OptionalAuth};
pub use github::{GitHubError, GitHubOAuth, GitHubProfile};
pub use password::PasswordError;
pub use session::{SessionError, SessionKeys};
