// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session cookie handling.
//!
//! The session token travels in an `HttpOnly`, `SameSite=Strict` cookie named
//! [`SESSION_COOKIE`], scoped to `/`.

use axum::http::{header::COOKIE, HeaderMap};
use cookie::{time::Duration, Cookie, SameSite};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "authToken";

/// Attributes applied to the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieSettings {
    /// Set the `Secure` attribute (HTTPS deployments).
    pub secure: bool,
    /// Cookie lifetime, matching the token TTL.
    pub max_age_secs: u64,
}

impl CookieSettings {
    /// Cookie carrying a freshly signed session token.
    pub fn session_cookie(&self, token: &str) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token.to_string()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .path("/")
            .secure(self.secure)
            .max_age(Duration::seconds(self.max_age_secs as i64))
            .build()
    }

    /// Cookie that instructs the browser to drop the session.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build((SESSION_COOKIE, ""))
            .http_only(true)
            .same_site(SameSite::Strict)
            .path("/")
            .secure(self.secure)
            .build();
        cookie.make_removal();
        cookie
    }
}

/// Read the session token from the request's `Cookie` headers.
///
/// Empty values are treated as absent.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == SESSION_COOKIE && !c.value().is_empty())
        .map(|c| c.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SETTINGS: CookieSettings = CookieSettings {
        secure: false,
        max_age_secs: 604_800,
    };

    #[test]
    fn session_cookie_has_hardened_attributes() {
        let header = SETTINGS.session_cookie("abc.def.ghi").to_string();

        assert!(header.starts_with("authToken=abc.def.ghi"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("SameSite=Strict"));
        assert!(header.contains("Path=/"));
        assert!(header.contains("Max-Age=604800"));
        assert!(!header.contains("Secure"));
    }

    #[test]
    fn secure_flag_is_applied_when_configured() {
        let settings = CookieSettings {
            secure: true,
            ..SETTINGS
        };
        assert!(settings.session_cookie("t").to_string().contains("Secure"));
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let header = SETTINGS.removal_cookie().to_string();
        assert!(header.starts_with("authToken=;"));
        assert!(header.contains("Max-Age=0"));
        assert!(header.contains("Path=/"));
    }

    #[test]
    fn token_is_found_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; authToken=tok123; lang=en"),
        );
        assert_eq!(session_token_from_headers(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn token_is_found_across_multiple_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(COOKIE, HeaderValue::from_static("authToken=tok456"));
        assert_eq!(session_token_from_headers(&headers).as_deref(), Some("tok456"));
    }

    #[test]
    fn missing_or_empty_token_is_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token_from_headers(&headers), None);

        headers.insert(COOKIE, HeaderValue::from_static("authToken="));
        assert_eq!(session_token_from_headers(&headers), None);
    }
}
