//! Integration tests — build the router over in-memory stores and drive the
//! auth endpoints end to end.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use folio_api::{AppState, config::ApiConfig};
use folio_core::auth::jwt::TokenCodec;
use folio_core::auth::memory::{MemoryCredentialStore, MemoryRefreshTokenStore};
use folio_core::auth::notify::{NotifyError, ResetNotifier};
use folio_core::auth::session::{SessionConfig, SessionService};
use folio_core::auth::store::CredentialStore;
use folio_core::models::auth::{Role, User};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

#[derive(Default)]
struct Outbox {
    tokens: Mutex<Vec<String>>,
}

impl Outbox {
    /// Latest token once `count` have arrived; delivery runs in the background.
    async fn delivered(&self, count: usize) -> String {
        for _ in 0..200 {
            if let Some(token) = self.ready(count) {
                return token;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("reset token {count} was never delivered");
    }

    fn ready(&self, count: usize) -> Option<String> {
        let tokens = self.tokens.lock().unwrap();
        (tokens.len() >= count).then(|| tokens[tokens.len() - 1].clone())
    }
}

#[async_trait]
impl ResetNotifier for Outbox {
    async fn send_password_reset(&self, _user: &User, token: &str) -> Result<(), NotifyError> {
        self.tokens.lock().unwrap().push(token.to_string());
        Ok(())
    }
}

struct TestApp {
    router: Router,
    outbox: Arc<Outbox>,
    admin: User,
}

async fn test_app() -> TestApp {
    let credentials = Arc::new(MemoryCredentialStore::with_cost(4));
    credentials
        .create_user("a@x.com", "secret123", Some("Ada"), Role::User)
        .await
        .expect("seed user");
    let admin = credentials
        .create_user("admin@x.com", "admin-pass-1", None, Role::Admin)
        .await
        .expect("seed admin");

    let outbox = Arc::new(Outbox::default());
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        pg_connection_url: String::new(),
        jwt_secret: SECRET.into(),
        session: SessionConfig::default(),
        reset_url_base: "http://localhost:3000".into(),
        reset_webhook_url: None,
    };
    let session = SessionService::new(
        credentials,
        Arc::new(MemoryRefreshTokenStore::new()),
        outbox.clone(),
        TokenCodec::new(SECRET.as_bytes()),
        config.session.clone(),
    );

    let router = folio_api::router(AppState {
        session: Arc::new(session),
        config,
    });
    TestApp {
        router,
        outbox,
        admin,
    }
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(json) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.expect("request");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse JSON")
    };
    (status, json)
}

async fn login(app: &Router, email: &str, password: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/login",
        Some(json!({"email": email, "password": password})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body
}

#[tokio::test]
async fn login_then_refresh_rotates_tokens() {
    let app = test_app().await;
    let body = login(&app.router, "a@x.com", "secret123").await;

    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["expiresIn"], 900);
    assert_eq!(body["user"]["email"], "a@x.com");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("passwordHash").is_none());
    let original = body["refreshToken"].as_str().unwrap().to_string();

    let (status, rotated) = send(
        &app.router,
        Method::POST,
        "/auth/refresh",
        Some(json!({"refreshToken": original})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(rotated["accessToken"].is_string());
    assert_ne!(rotated["refreshToken"].as_str().unwrap(), original);

    let (status, err) = send(
        &app.router,
        Method::POST,
        "/auth/refresh",
        Some(json!({"refreshToken": original})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"], "refresh_rejected");
}

#[tokio::test]
async fn bad_credentials_are_generic() {
    let app = test_app().await;
    let (s1, unknown) = send(
        &app.router,
        Method::POST,
        "/auth/login",
        Some(json!({"email": "nobody@x.com", "password": "secret123"})),
        None,
    )
    .await;
    let (s2, wrong) = send(
        &app.router,
        Method::POST,
        "/auth/login",
        Some(json!({"email": "a@x.com", "password": "nope-nope"})),
        None,
    )
    .await;
    assert_eq!(s1, StatusCode::UNAUTHORIZED);
    assert_eq!(s2, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, wrong);
    assert_eq!(unknown["error"], "auth_failed");
}

#[tokio::test]
async fn logout_is_idempotent() {
    let app = test_app().await;
    let body = login(&app.router, "a@x.com", "secret123").await;
    let refresh = body["refreshToken"].as_str().unwrap();

    for _ in 0..2 {
        let (status, resp) = send(
            &app.router,
            Method::POST,
            "/auth/logout",
            Some(json!({"refreshToken": refresh})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["success"], true);
    }

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/auth/refresh",
        Some(json!({"refreshToken": refresh})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_route_distinguishes_missing_and_invalid_tokens() {
    let app = test_app().await;

    let (status, err) = send(&app.router, Method::GET, "/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"], "auth_required");

    let (status, err) = send(&app.router, Method::GET, "/auth/me", None, Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"], "token_invalid");

    let body = login(&app.router, "a@x.com", "secret123").await;
    let access = body["accessToken"].as_str().unwrap();
    let (status, me) = send(&app.router, Method::GET, "/auth/me", None, Some(access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "a@x.com");
    assert_eq!(me["name"], "Ada");
}

#[tokio::test]
async fn logout_all_revokes_every_session() {
    let app = test_app().await;
    let first = login(&app.router, "a@x.com", "secret123").await;
    let second = login(&app.router, "a@x.com", "secret123").await;
    let access = first["accessToken"].as_str().unwrap();

    let (status, resp) = send(
        &app.router,
        Method::POST,
        "/auth/logout-all",
        None,
        Some(access),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["revoked"], 2);

    for body in [first, second] {
        let (status, _) = send(
            &app.router,
            Method::POST,
            "/auth/refresh",
            Some(json!({"refreshToken": body["refreshToken"]})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn admin_gate_separates_forbidden_from_unauthenticated() {
    let app = test_app().await;
    let user = login(&app.router, "a@x.com", "secret123").await;
    let user_id = user["user"]["id"].as_str().unwrap().to_string();
    let uri = format!("/admin/users/{user_id}/revoke-sessions");

    let (status, err) = send(&app.router, Method::POST, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"], "auth_required");

    let user_access = user["accessToken"].as_str().unwrap();
    let (status, err) = send(&app.router, Method::POST, &uri, None, Some(user_access)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], "forbidden");

    let admin = login(&app.router, &app.admin.email, "admin-pass-1").await;
    let admin_access = admin["accessToken"].as_str().unwrap();
    let (status, resp) = send(&app.router, Method::POST, &uri, None, Some(admin_access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["revoked"], 1);

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/admin/users/does-not-exist/revoke-sessions",
        None,
        Some(admin_access),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn optional_auth_never_rejects() {
    let app = test_app().await;

    let (status, resp) = send(&app.router, Method::GET, "/auth/session", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["authenticated"], false);

    let (status, resp) =
        send(&app.router, Method::GET, "/auth/session", None, Some("garbage")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["authenticated"], false);

    let body = login(&app.router, "a@x.com", "secret123").await;
    let access = body["accessToken"].as_str().unwrap();
    let (status, resp) = send(&app.router, Method::GET, "/auth/session", None, Some(access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["authenticated"], true);
    assert_eq!(resp["user"]["email"], "a@x.com");
}

#[tokio::test]
async fn forgot_password_response_hides_account_existence() {
    let app = test_app().await;
    let (s1, known) = send(
        &app.router,
        Method::POST,
        "/auth/forgot-password",
        Some(json!({"email": "a@x.com"})),
        None,
    )
    .await;
    let (s2, unknown) = send(
        &app.router,
        Method::POST,
        "/auth/forgot-password",
        Some(json!({"email": "nobody@nowhere.com"})),
        None,
    )
    .await;
    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);
    assert_eq!(known, unknown);
    app.outbox.delivered(1).await;
    assert_eq!(app.outbox.tokens.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn reset_password_flow_is_single_use() {
    let app = test_app().await;
    let session = login(&app.router, "a@x.com", "secret123").await;

    send(
        &app.router,
        Method::POST,
        "/auth/forgot-password",
        Some(json!({"email": "a@x.com"})),
        None,
    )
    .await;
    let token = app.outbox.delivered(1).await;
    let verify_uri = format!("/auth/verify-reset-token/{token}");

    let (status, resp) = send(&app.router, Method::GET, &verify_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["valid"], true);

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/auth/reset-password",
        Some(json!({"token": token, "password": "brand-new-pass"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, resp) = send(&app.router, Method::GET, &verify_uri, None, None).await;
    assert_eq!(resp["valid"], false);

    let (status, err) = send(
        &app.router,
        Method::POST,
        "/auth/reset-password",
        Some(json!({"token": token, "password": "another-new-pass"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "invalid_or_expired");

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/auth/refresh",
        Some(json!({"refreshToken": session["refreshToken"]})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    login(&app.router, "a@x.com", "brand-new-pass").await;
}
