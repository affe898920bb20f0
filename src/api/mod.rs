// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::SESSION_COOKIE,
    crypto::Envelope,
    models::{AudioAttachment, MessageResponse, NoteText},
    state::AppState,
    storage::{StoredUpload, UPLOADS_URL_PREFIX},
};

pub mod auth;
pub mod github;
pub mod health;
pub mod notes;
pub mod public;
pub mod uploads;
pub mod validation;

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(state.cors_origin.as_deref());
    let uploads_dir = state.uploads.dir();

    let upload_routes = Router::new()
        .route("/api/upload", post(uploads::upload_image))
        .route("/api/upload/audio", post(uploads::upload_audio))
        .route("/api/upload/attachments", post(uploads::upload_attachments))
        .layer(DefaultBodyLimit::max(uploads::MAX_UPLOAD_BODY_BYTES));

    let api_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", get(auth::logout))
        .route("/api/auth/user", get(auth::current_user))
        .route("/api/auth/update-profile", put(auth::update_profile))
        .route("/api/auth/github", get(github::github_login))
        .route("/api/auth/github/callback", get(github::github_callback))
        .route(
            "/api/notes",
            get(notes::list_notes).post(notes::create_note),
        )
        .route(
            "/api/notes/{id}",
            get(notes::get_note)
                .put(notes::update_note)
                .delete(notes::delete_note),
        )
        .route("/api/notes/share/{id}", put(notes::share_note))
        .route("/api/public/notes/{id}", get(public::get_public_note))
        .merge(upload_routes)
        .with_state(state);

    Router::new()
        .merge(api_routes)
        .nest_service(UPLOADS_URL_PREFIX, ServeDir::new(uploads_dir))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors)
}

/// Credentialed CORS for one origin, or permissive CORS when none is set.
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };

    match HeaderValue::from_str(origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .allow_credentials(true),
        Err(e) => {
            tracing::warn!(origin, error = %e, "Ignoring invalid CORS origin");
            CorsLayer::new()
        }
    }
}

/// Registers the session cookie as an API key security scheme.
struct SessionCookieAuth;

impl Modify for SessionCookieAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "cookie_auth",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        auth::register,
        auth::login,
        auth::logout,
        auth::current_user,
        auth::update_profile,
        github::github_login,
        github::github_callback,
        notes::list_notes,
        notes::create_note,
        notes::get_note,
        notes::update_note,
        notes::delete_note,
        notes::share_note,
        public::get_public_note,
        uploads::upload_image,
        uploads::upload_audio,
        uploads::upload_attachments
    ),
    components(
        schemas(
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::UpdateProfileRequest,
            auth::AuthResponse,
            auth::UserProfile,
            auth::AuthProvider,
            notes::Note,
            notes::CreateNoteRequest,
            notes::UpdateNoteRequest,
            notes::ShareNoteRequest,
            notes::NoteListResponse,
            notes::NoteResponse,
            notes::DeleteNoteResponse,
            notes::ShareNoteResponse,
            public::PublicNote,
            public::PublicAuthor,
            uploads::AudioUploadResponse,
            uploads::AttachmentsResponse,
            StoredUpload,
            NoteText,
            Envelope,
            AudioAttachment,
            MessageResponse
        )
    ),
    modifiers(&SessionCookieAuth),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Auth", description = "Accounts, sessions and GitHub sign-in"),
        (name = "Notes", description = "Note management for the signed-in user"),
        (name = "Public", description = "Read-only access to shared notes"),
        (name = "Uploads", description = "Image, audio and attachment uploads")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use axum::{
        body::{to_bytes, Body},
        http::{HeaderMap, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Reply {
        status: StatusCode,
        headers: HeaderMap,
        body: Value,
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Reply {
            status,
            headers,
            body,
        }
    }

    /// Register and log in, returning the `authToken=...` cookie pair.
    async fn sign_up(app: &Router, username: &str) -> String {
        let credentials = json!({ "username": username, "password": "secret1" });

        let reply = send(app, "POST", "/api/auth/register", None, Some(credentials.clone())).await;
        assert_eq!(reply.status, StatusCode::CREATED);

        let reply = send(app, "POST", "/api/auth/login", None, Some(credentials)).await;
        assert_eq!(reply.status, StatusCode::OK);

        let set_cookie = reply.headers[header::SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, _dir) = test_state();
        let app = router(state);
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn note_sharing_scenario() {
        let (state, _dir) = test_state();
        let app = router(state);

        let alice = sign_up(&app, "alice").await;
        let bob = sign_up(&app, "bob").await;

        let created = send(
            &app,
            "POST",
            "/api/notes",
            Some(&alice),
            Some(json!({ "title": "Groceries", "description": "milk, eggs" })),
        )
        .await;
        assert_eq!(created.status, StatusCode::CREATED);
        assert_eq!(created.body["note"]["tag"], "General");
        let id = created.body["note"]["id"].as_str().unwrap().to_string();
        let note_uri = format!("/api/notes/{id}");

        // No session
        let reply = send(&app, "GET", &note_uri, None, None).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply.body["error_code"], "missing_session");

        // Someone else's private note
        let reply = send(&app, "GET", &note_uri, Some(&bob), None).await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN);

        let public_uri = format!("/api/public/notes/{id}");
        let reply = send(&app, "GET", &public_uri, None, None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);

        let reply = send(
            &app,
            "PUT",
            &format!("/api/notes/share/{id}"),
            Some(&alice),
            Some(json!({ "isPublic": true })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["sharePath"], public_uri.as_str());

        let reply = send(&app, "GET", &public_uri, None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["title"], "Groceries");
        assert_eq!(reply.body["author"]["username"], "alice");

        let reply = send(&app, "GET", &note_uri, Some(&bob), None).await;
        assert_eq!(reply.status, StatusCode::OK);

        let reply = send(&app, "GET", "/api/notes", Some(&bob), None).await;
        assert_eq!(reply.body["total"], 0);

        let reply = send(&app, "DELETE", &note_uri, Some(&alice), None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["id"], id.as_str());

        let reply = send(&app, "GET", &note_uri, Some(&alice), None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn expired_and_tampered_sessions_are_rejected() {
        let (state, _dir) = test_state();
        let long_ago = chrono::Utc::now().timestamp() - 30 * 24 * 60 * 60;
        let expired = state.sessions.sign_at("alice", long_ago).unwrap();
        let valid = state.sessions.sign("alice").unwrap();
        let app = router(state);

        let reply = send(&app, "GET", "/api/notes", Some(&format!("authToken={expired}")), None).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply.body["error_code"], "session_expired");

        let tampered = format!("authToken={}", valid.replacen('.', ".x", 1));
        let reply = send(&app, "GET", "/api/notes", Some(&tampered), None).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply.body["error_code"], "invalid_session");
    }

    #[tokio::test]
    async fn profile_and_logout_round_trip() {
        let (state, _dir) = test_state();
        let app = router(state);
        let alice = sign_up(&app, "alice").await;

        let reply = send(&app, "GET", "/api/auth/user", Some(&alice), None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["username"], "alice");
        assert!(reply.body.get("passwordHash").is_none());
        assert!(reply.body.get("password_hash").is_none());

        let reply = send(
            &app,
            "PUT",
            "/api/auth/update-profile",
            Some(&alice),
            Some(json!({ "name": "Alice", "bio": "x".repeat(161) })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);

        let reply = send(&app, "GET", "/api/auth/logout", None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
        let cleared = reply.headers[header::SET_COOKIE].to_str().unwrap();
        assert!(cleared.starts_with("authToken=;"));
    }

    #[tokio::test]
    async fn register_validation_and_conflicts() {
        let (state, _dir) = test_state();
        let app = router(state);
        sign_up(&app, "alice").await;

        let reply = send(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "username": "Alice", "password": "secret1" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::CONFLICT);

        let reply = send(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "username": "carol", "password": "short" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["error"], "Password must be 6-64 characters");

        let reply = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply.body["error"], "Invalid username or password");
    }

    #[tokio::test]
    async fn uploaded_files_are_served() {
        let (state, _dir) = test_state();
        let app = router(state);
        let alice = sign_up(&app, "alice").await;

        let boundary = "savebook-router-test";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"dot.png\"\r\nContent-Type: image/png\r\n\r\nPNGDATA\r\n--{boundary}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(header::COOKIE, &alice)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let upload: Value = serde_json::from_slice(&bytes).unwrap();
        let url = upload["url"].as_str().unwrap();

        let request = Request::builder().uri(url).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let served = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&served[..], b"PNGDATA");

        // Uploads require a session
        let reply = send(&app, "POST", "/api/upload", None, None).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_and_docs_are_public() {
        let (state, _dir) = test_state();
        let app = router(state);

        let reply = send(&app, "GET", "/health", None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["status"], "ok");

        let reply = send(&app, "GET", "/api-doc/openapi.json", None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert!(reply.body["paths"]["/api/notes/{id}"].is_object());
        assert!(reply.body["components"]["securitySchemes"]["cookie_auth"].is_object());
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let (state, _dir) = test_state();
        let app = router(state);

        let reply = send(&app, "GET", "/health/live", None, None).await;
        assert!(reply.headers.contains_key("x-request-id"));
    }

    #[test]
    fn cors_layer_accepts_configured_origin() {
        // Construction must not panic for either mode
        let _ = cors_layer(Some("http://localhost:3000"));
        let _ = cors_layer(None);
        let _ = cors_layer(Some("bad\norigin"));
    }
}
