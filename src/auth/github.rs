// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # GitHub OAuth 2.0 sign-in
//!
//! Authorization Code flow with PKCE.
//!
//! 1. [`GitHubOAuth::authorize_url`] builds the GitHub authorization URL with a
//!    random CSRF state and an S256 PKCE challenge. The caller persists the
//!    state and verifier (see `OAuthStateRepository`).
//! 2. [`GitHubOAuth::exchange_code`] trades the code and verifier for an access
//!    token and fetches the user's profile from the GitHub REST API.
//! 3. [`find_or_create_user`] maps the profile onto a local account, linking
//!    by GitHub id.

use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;

use crate::config::GitHubConfig;
use crate::storage::{DocumentStore, StorageError, StorageResult, StoredUser, UserRepository};

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const API_BASE: &str = "https://api.github.com";
const CLIENT_USER_AGENT: &str = "savebook-server";

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("invalid GitHub OAuth configuration: {0}")]
    InvalidConfig(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("GitHub API request failed: {0}")]
    Api(#[from] reqwest::Error),
}

/// Profile returned by `GET /user`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitHubProfile {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// A started authorization: where to send the browser and what to remember.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub url: String,
    pub state: String,
    pub pkce_verifier: String,
}

/// GitHub OAuth handler.
#[derive(Clone)]
pub struct GitHubOAuth {
    client: ConfiguredClient,
    http: reqwest::Client,
}

impl GitHubOAuth {
    pub fn new(config: &GitHubConfig) -> Result<Self, GitHubError> {
        let auth_url = AuthUrl::new(AUTHORIZE_URL.to_string())
            .map_err(|e| GitHubError::InvalidConfig(e.to_string()))?;
        let token_url = TokenUrl::new(TOKEN_URL.to_string())
            .map_err(|e| GitHubError::InvalidConfig(e.to_string()))?;
        let redirect_url = RedirectUrl::new(config.redirect_url.clone())
            .map_err(|e| GitHubError::InvalidConfig(format!("redirect URL: {e}")))?;

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        // Redirects are disabled to prevent SSRF during the token exchange
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client, http })
    }

    /// Build the authorization URL with a fresh state and PKCE challenge.
    pub fn authorize_url(&self) -> PendingAuthorization {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (url, csrf_state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("read:user".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        PendingAuthorization {
            url: url.to_string(),
            state: csrf_state.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        }
    }

    /// Exchange an authorization code for a token and fetch the profile.
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: String,
    ) -> Result<GitHubProfile, GitHubError> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(&self.http)
            .await
            .map_err(|e| GitHubError::TokenExchange(e.to_string()))?;

        let profile = self
            .http
            .get(format!("{API_BASE}/user"))
            .bearer_auth(token.access_token().secret())
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?
            .json::<GitHubProfile>()
            .await?;

        Ok(profile)
    }
}

impl std::fmt::Debug for GitHubOAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubOAuth").finish_non_exhaustive()
    }
}

impl GitHubProfile {
    fn to_user(&self, username: &str) -> StoredUser {
        let now = chrono::Utc::now();
        StoredUser {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: None,
            name: non_blank(&self.name),
            bio: non_blank(&self.bio),
            location: non_blank(&self.location),
            avatar_url: non_blank(&self.avatar_url),
            github_id: Some(self.id.to_string()),
            created_at: now,
            updated_at: now,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Find the account linked to a GitHub profile, or create one.
///
/// The username is the folded GitHub login; if that is taken the GitHub id is
/// appended (`login-<id>`). Returns the user and whether it was just created.
/// Profile fields are copied only at creation so later local edits stick.
pub fn find_or_create_user(
    store: &DocumentStore,
    profile: &GitHubProfile,
) -> StorageResult<(StoredUser, bool)> {
    let repo = UserRepository::new(store);
    let github_id = profile.id.to_string();

    if let Some(user) = repo.find_by_github_id(&github_id)? {
        return Ok((user, false));
    }

    let base = crate::storage::fold_username(&profile.login);
    let candidates = [base.clone(), format!("{base}-{github_id}")];

    for candidate in candidates {
        if repo.username_taken(&candidate)? {
            continue;
        }

        let user = profile.to_user(&candidate);
        match repo.create(&user) {
            Ok(()) => {
                tracing::info!(user_id = %user.id, github_id = %github_id, "User created from GitHub login");
                return Ok((user, true));
            }
            // Lost a race: either the name or the GitHub account was just claimed
            Err(StorageError::AlreadyExists(_)) => {
                if let Some(existing) = repo.find_by_github_id(&github_id)? {
                    return Ok((existing, false));
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(StorageError::AlreadyExists(format!("Username {base}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use url::Url;

    fn test_store() -> (DocumentStore, TempDir) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = DocumentStore::open(&dir.path().join("test.redb")).unwrap();
        (store, dir)
    }

    fn profile(id: i64, login: &str) -> GitHubProfile {
        GitHubProfile {
            id,
            login: login.to_string(),
            name: Some("Octo Cat".to_string()),
            avatar_url: Some("https://avatars.githubusercontent.com/u/1".to_string()),
            bio: Some("  ".to_string()),
            location: None,
        }
    }

    fn config() -> GitHubConfig {
        GitHubConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_url: "http://localhost:8080/api/auth/github/callback".to_string(),
        }
    }

    #[test]
    fn authorize_url_carries_state_and_pkce() {
        let oauth = GitHubOAuth::new(&config()).unwrap();
        let pending = oauth.authorize_url();

        let url = Url::parse(&pending.url).unwrap();
        assert_eq!(url.host_str(), Some("github.com"));

        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query["client_id"], "client-id");
        assert_eq!(query["state"], pending.state);
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(query["scope"], "read:user");
        assert!(!pending.pkce_verifier.is_empty());

        // Fresh state per call
        assert_ne!(oauth.authorize_url().state, pending.state);
    }

    #[test]
    fn invalid_redirect_url_is_rejected() {
        let mut bad = config();
        bad.redirect_url = "not a url".to_string();
        assert!(matches!(
            GitHubOAuth::new(&bad),
            Err(GitHubError::InvalidConfig(_))
        ));
    }

    #[test]
    fn first_login_creates_user_with_profile() {
        let (store, _dir) = test_store();

        let (user, created) = find_or_create_user(&store, &profile(42, "OctoCat")).unwrap();
        assert!(created);
        assert_eq!(user.username, "octocat");
        assert_eq!(user.github_id.as_deref(), Some("42"));
        assert_eq!(user.name.as_deref(), Some("Octo Cat"));
        assert!(user.bio.is_none());
        assert!(user.password_hash.is_none());
    }

    #[test]
    fn returning_login_finds_same_user() {
        let (store, _dir) = test_store();

        let (first, _) = find_or_create_user(&store, &profile(42, "octocat")).unwrap();
        let (second, created) = find_or_create_user(&store, &profile(42, "renamed")).unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(second.username, "octocat");
    }

    #[test]
    fn taken_username_gets_github_id_suffix() {
        let (store, _dir) = test_store();
        UserRepository::new(&store)
            .create(&StoredUser::with_password("octocat", "hash".to_string()))
            .unwrap();

        let (user, created) = find_or_create_user(&store, &profile(42, "octocat")).unwrap();
        assert!(created);
        assert_eq!(user.username, "octocat-42");
    }
}
