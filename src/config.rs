// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values, and the
//! [`Config`] struct they are parsed into. Configuration is loaded from the
//! environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Root directory for the document store and uploads | `./data` |
//! | `JWT_SECRET` | HS256 session signing secret (min 32 bytes) | Random per process |
//! | `SESSION_TTL_SECS` | Session lifetime in seconds | `604800` (7 days) |
//! | `COOKIE_SECURE` | Mark the session cookie `Secure` | `false` |
//! | `NOTE_ENCRYPTION_SECRET` | Secret for sealing note text at rest | Unset (disabled) |
//! | `GITHUB_CLIENT_ID` | GitHub OAuth client id | Unset (disabled) |
//! | `GITHUB_CLIENT_SECRET` | GitHub OAuth client secret | Unset (disabled) |
//! | `GITHUB_REDIRECT_URL` | GitHub OAuth callback URL | `http://localhost:8080/api/auth/github/callback` |
//! | `FRONTEND_URL` | Where to send the browser after GitHub login | `/` |
//! | `CORS_ALLOWED_ORIGIN` | Origin allowed to send credentialed requests | Permissive CORS |
//! | `TLS_CERT_PATH` | PEM certificate chain for HTTPS | Unset (plain HTTP) |
//! | `TLS_KEY_PATH` | PEM private key for HTTPS | Unset (plain HTTP) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;

use rand::RngCore;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the data directory path.
///
/// Holds `savebook.redb` and the `uploads/` directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const SESSION_TTL_ENV: &str = "SESSION_TTL_SECS";
pub const COOKIE_SECURE_ENV: &str = "COOKIE_SECURE";
pub const NOTE_SECRET_ENV: &str = "NOTE_ENCRYPTION_SECRET";
pub const GITHUB_CLIENT_ID_ENV: &str = "GITHUB_CLIENT_ID";
pub const GITHUB_CLIENT_SECRET_ENV: &str = "GITHUB_CLIENT_SECRET";
pub const GITHUB_REDIRECT_URL_ENV: &str = "GITHUB_REDIRECT_URL";
pub const FRONTEND_URL_ENV: &str = "FRONTEND_URL";
pub const CORS_ORIGIN_ENV: &str = "CORS_ALLOWED_ORIGIN";
pub const TLS_CERT_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";
pub const DEFAULT_GITHUB_REDIRECT_URL: &str = "http://localhost:8080/api/auth/github/callback";

/// One week, matching the cookie `Max-Age`.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// HS256 keys shorter than the hash output weaken the MAC.
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{present} is set but {missing} is not")]
    Incomplete {
        present: &'static str,
        missing: &'static str,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// GitHub OAuth application credentials.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

/// PEM files for serving HTTPS.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Fully parsed runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub jwt_secret: Vec<u8>,
    /// `false` when `JWT_SECRET` was missing and a random secret was generated.
    pub jwt_secret_configured: bool,
    pub session_ttl_secs: u64,
    pub cookie_secure: bool,
    pub note_secret: Option<String>,
    pub github: Option<GitHubConfig>,
    pub frontend_url: String,
    pub cors_origin: Option<String>,
    pub tls: Option<TlsConfig>,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get(PORT_ENV) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: PORT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let (jwt_secret, jwt_secret_configured) = match get(JWT_SECRET_ENV) {
            Some(secret) if secret.len() < MIN_JWT_SECRET_LEN => {
                return Err(ConfigError::Invalid {
                    var: JWT_SECRET_ENV,
                    reason: format!("must be at least {MIN_JWT_SECRET_LEN} bytes"),
                });
            }
            Some(secret) => (secret.into_bytes(), true),
            None => {
                let mut secret = vec![0u8; 64];
                rand::thread_rng().fill_bytes(&mut secret);
                (secret, false)
            }
        };

        let session_ttl_secs = match get(SESSION_TTL_ENV) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => {
                    return Err(ConfigError::Invalid {
                        var: SESSION_TTL_ENV,
                        reason: "must be greater than zero".to_string(),
                    })
                }
                Ok(ttl) => ttl,
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: SESSION_TTL_ENV,
                        reason: e.to_string(),
                    })
                }
            },
            None => DEFAULT_SESSION_TTL_SECS,
        };

        let cookie_secure = match get(COOKIE_SECURE_ENV) {
            Some(raw) => parse_bool(COOKIE_SECURE_ENV, &raw)?,
            None => false,
        };

        let github = match (get(GITHUB_CLIENT_ID_ENV), get(GITHUB_CLIENT_SECRET_ENV)) {
            (Some(client_id), Some(client_secret)) => Some(GitHubConfig {
                client_id,
                client_secret,
                redirect_url: get(GITHUB_REDIRECT_URL_ENV)
                    .unwrap_or_else(|| DEFAULT_GITHUB_REDIRECT_URL.to_string()),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    present: GITHUB_CLIENT_ID_ENV,
                    missing: GITHUB_CLIENT_SECRET_ENV,
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    present: GITHUB_CLIENT_SECRET_ENV,
                    missing: GITHUB_CLIENT_ID_ENV,
                })
            }
            (None, None) => None,
        };

        let tls = match (get(TLS_CERT_ENV), get(TLS_KEY_ENV)) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    present: TLS_CERT_ENV,
                    missing: TLS_KEY_ENV,
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    present: TLS_KEY_ENV,
                    missing: TLS_CERT_ENV,
                })
            }
            (None, None) => None,
        };

        let log_format = match get(LOG_FORMAT_ENV).map(|v| v.to_lowercase()) {
            Some(v) if v == "json" => LogFormat::Json,
            Some(v) if v == "pretty" => LogFormat::Pretty,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: LOG_FORMAT_ENV,
                    reason: format!("expected `json` or `pretty`, got `{other}`"),
                })
            }
            None => LogFormat::Pretty,
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())),
            jwt_secret,
            jwt_secret_configured,
            session_ttl_secs,
            cookie_secure,
            note_secret: get(NOTE_SECRET_ENV),
            github,
            frontend_url: get(FRONTEND_URL_ENV).unwrap_or_else(|| "/".to_string()),
            cors_origin: get(CORS_ORIGIN_ENV),
            tls,
            log_format,
        })
    }

    /// Socket address string in `host:port` form.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            var,
            reason: format!("expected a boolean, got `{other}`"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.session_ttl_secs, DEFAULT_SESSION_TTL_SECS);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(!config.cookie_secure);
        assert!(!config.jwt_secret_configured);
        assert_eq!(config.jwt_secret.len(), 64);
        assert!(config.github.is_none());
        assert!(config.tls.is_none());
        assert!(config.note_secret.is_none());
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        let err = load(&[(JWT_SECRET_ENV, "too-short")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: JWT_SECRET_ENV, .. }));
    }

    #[test]
    fn github_requires_both_credentials() {
        let err = load(&[(GITHUB_CLIENT_ID_ENV, "abc")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Incomplete {
                present: GITHUB_CLIENT_ID_ENV,
                missing: GITHUB_CLIENT_SECRET_ENV,
            }
        );

        let config = load(&[
            (GITHUB_CLIENT_ID_ENV, "abc"),
            (GITHUB_CLIENT_SECRET_ENV, "shh"),
        ])
        .unwrap();
        let github = config.github.unwrap();
        assert_eq!(github.client_id, "abc");
        assert_eq!(github.redirect_url, DEFAULT_GITHUB_REDIRECT_URL);
    }

    #[test]
    fn parses_explicit_values() {
        let config = load(&[
            (PORT_ENV, "9000"),
            (JWT_SECRET_ENV, "0123456789abcdef0123456789abcdef"),
            (SESSION_TTL_ENV, "3600"),
            (COOKIE_SECURE_ENV, "true"),
            (LOG_FORMAT_ENV, "JSON"),
            (NOTE_SECRET_ENV, "note-secret"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.jwt_secret_configured);
        assert_eq!(config.session_ttl_secs, 3600);
        assert!(config.cookie_secure);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.note_secret.as_deref(), Some("note-secret"));
    }

    #[test]
    fn rejects_bad_port_and_zero_ttl() {
        assert!(load(&[(PORT_ENV, "eighty")]).is_err());
        assert!(load(&[(SESSION_TTL_ENV, "0")]).is_err());
        assert!(load(&[(COOKIE_SECURE_ENV, "maybe")]).is_err());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = load(&[(HOST_ENV, "  "), (NOTE_SECRET_ENV, "")]).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert!(config.note_secret.is_none());
    }
}
