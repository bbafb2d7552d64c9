// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end auth scenarios driven through the full router.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

use relational_account_server::{
    api::router,
    auth::Role,
    config::AppConfig,
    mailer::{MailError, Mailer},
    state::AppState,
    storage::NewUser,
};

const ADMIN_EMAIL: &str = "root@example.com";
const PASSWORD: &str = "correct-horse";

/// Captures confirmation tokens instead of sending letters.
struct CapturingMailer {
    tokens: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send_confirmation(&self, token: &str, _email: &str, _name: &str) -> Result<(), MailError> {
        let _ = self.tokens.send(token.to_string());
        Ok(())
    }

    async fn send_verified(&self, _email: &str) -> Result<(), MailError> {
        Ok(())
    }
}

struct TestApp {
    _dir: TempDir,
    state: AppState,
    app: Router,
    tokens: mpsc::UnboundedReceiver<String>,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_string_lossy().into_owned();
        let config = AppConfig::from_lookup(|name| {
            match name {
                "DATA_DIR" => Some(data_dir.as_str()),
                "JWT_ACCESS_SECRET" => Some("access-secret"),
                "JWT_REFRESH_SECRET" => Some("refresh-secret"),
                "JWT_VERIFICATION_SECRET" => Some("verification-secret"),
                "PERSONAL_ID_KEY" => Some("personal-id-key"),
                "ARGON2_MEMORY_KIB" => Some("64"),
                "ARGON2_ITERATIONS" => Some("1"),
                _ => None,
            }
            .map(str::to_string)
        })
        .unwrap();

        let db = Arc::new(
            relational_account_server::storage::AccountDatabase::open_in(&config.data_dir).unwrap(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let state = AppState::new(&config, db, Arc::new(CapturingMailer { tokens: tx })).unwrap();

        Self {
            _dir: dir,
            app: router(state.clone()),
            state,
            tokens: rx,
        }
    }

    fn seed(&self, email: &str, role: Role, verified: bool) -> i64 {
        let user = self
            .state
            .users
            .create(NewUser {
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                phone_number: "5551234".to_string(),
                email: email.to_string(),
                password_hash: self.state.passwords.hash(PASSWORD).unwrap(),
                role,
                personal_id: None,
            })
            .unwrap();
        if verified {
            self.state.users.mark_verified(user.id).unwrap();
        }
        user.id
    }

    async fn call(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn login(&self, email: &str) -> (String, String) {
        let response = self
            .call(json_request(
                Method::POST,
                "/v1/auth/login",
                json!({ "email": email, "password": PASSWORD }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        (
            cookie_value(&response, "access_token").unwrap(),
            cookie_value(&response, "refresh_token").unwrap(),
        )
    }

    async fn next_token(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(5), self.tokens.recv())
            .await
            .unwrap()
            .unwrap()
    }
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn bearer(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

fn cookie_value(response: &Response, name: &str) -> Option<String> {
    set_cookies(response).into_iter().find_map(|cookie| {
        let pair = cookie.split(';').next()?;
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn admin_login_grants_admin_routes() {
    let app = TestApp::new();
    let id = app.seed(ADMIN_EMAIL, Role::Admin, true);
    assert_eq!(id, 1);

    let (access, _) = app.login(ADMIN_EMAIL).await;
    let response = app.call(bearer(Method::GET, "/v1/admin/users", &access)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["users"][0]["email"], ADMIN_EMAIL);
}

#[tokio::test]
async fn login_cookies_are_http_only_secure_lax() {
    let app = TestApp::new();
    app.seed(ADMIN_EMAIL, Role::Admin, true);

    let response = app
        .call(json_request(
            Method::POST,
            "/v1/auth/login",
            json!({ "email": ADMIN_EMAIL, "password": PASSWORD }),
        ))
        .await;
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    for cookie in cookies {
        assert!(cookie.contains("HttpOnly"), "{cookie}");
        assert!(cookie.contains("Secure"), "{cookie}");
        assert!(cookie.contains("SameSite=Lax"), "{cookie}");
    }
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let app = TestApp::new();
    app.seed(ADMIN_EMAIL, Role::Admin, true);

    for body in [
        json!({ "email": ADMIN_EMAIL, "password": "wrong-password" }),
        json!({ "email": "ghost@example.com", "password": PASSWORD }),
    ] {
        let response = app.call(json_request(Method::POST, "/v1/auth/login", body)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response).is_empty());
        assert_eq!(
            body_json(response).await,
            json!({ "message": "Email or Password is incorrect" })
        );
    }
}

#[tokio::test]
async fn refresh_issues_only_access_cookie() {
    let app = TestApp::new();
    app.seed(ADMIN_EMAIL, Role::Admin, true);
    let (_, refresh) = app.login(ADMIN_EMAIL).await;

    let response = app.call(bearer(Method::POST, "/v1/auth/refresh", &refresh)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(cookie_value(&response, "access_token").is_some());
    assert!(cookie_value(&response, "refresh_token").is_none());
}

#[tokio::test]
async fn refresh_after_account_deletion_is_not_found() {
    let app = TestApp::new();
    let id = app.seed("gone@example.com", Role::Customer, true);
    let (_, refresh) = app.login("gone@example.com").await;

    app.state.users.delete(id).unwrap();

    let response = app.call(bearer(Method::POST, "/v1/auth/refresh", &refresh)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({ "message": "User not found" }));
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() {
    let app = TestApp::new();
    app.seed(ADMIN_EMAIL, Role::Admin, true);
    let (access, _) = app.login(ADMIN_EMAIL).await;

    let response = app.call(bearer(Method::POST, "/v1/auth/refresh", &access)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_header_and_missing_bearer_prefix() {
    let app = TestApp::new();

    let request = Request::get("/v1/users/me").body(Body::empty()).unwrap();
    let response = app.call(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({ "message": "Authorization header is missing" })
    );

    let request = Request::get("/v1/users/me")
        .header(header::AUTHORIZATION, "Token abc")
        .body(Body::empty())
        .unwrap();
    let response = app.call(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({ "message": "Bearer token is missing" })
    );
}

#[tokio::test]
async fn registration_then_single_use_verification() {
    let mut app = TestApp::new();

    let response = app
        .call(json_request(
            Method::POST,
            "/v1/auth/register/customer",
            json!({
                "email": "new@example.com",
                "phone_number": "+995555123456",
                "first_name": "Nina",
                "last_name": "Ray",
                "password": PASSWORD,
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let user = body_json(response).await;
    assert_eq!(user["role"], "CUSTOMER");
    assert_eq!(user["verified"], false);
    let id = user["id"].as_i64().unwrap();

    let token = app.next_token().await;
    let verify = format!("/v1/auth/verify?token={token}");

    let response = app
        .call(Request::get(verify.as_str()).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.state.users.get(id).unwrap().verified);

    let response = app
        .call(Request::get(verify.as_str()).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await,
        json!({ "message": "User verification token already used" })
    );
    assert!(app.state.users.get(id).unwrap().verified);
}

#[tokio::test]
async fn resend_confirmation_for_verified_account_is_conflict() {
    let app = TestApp::new();
    app.seed(ADMIN_EMAIL, Role::Admin, true);

    let response = app
        .call(json_request(
            Method::POST,
            "/v1/auth/resend-confirmation",
            json!({ "email": ADMIN_EMAIL }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await,
        json!({ "message": "User is already activated" })
    );
}

#[tokio::test]
async fn me_resolves_to_the_caller() {
    let app = TestApp::new();
    app.seed(ADMIN_EMAIL, Role::Admin, true);
    let id = app.seed("ann@example.com", Role::Customer, true);
    let (access, _) = app.login("ann@example.com").await;

    for uri in ["/v1/users/me".to_string(), format!("/v1/users/{id}")] {
        let response = app.call(bearer(Method::GET, &uri, &access)).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert_eq!(body_json(response).await["id"], id);
    }
}

#[tokio::test]
async fn customer_cannot_reach_other_users_or_admin_routes() {
    let app = TestApp::new();
    let admin = app.seed(ADMIN_EMAIL, Role::Admin, true);
    app.seed("ann@example.com", Role::Customer, true);
    let (access, _) = app.login("ann@example.com").await;

    let response = app
        .call(bearer(Method::GET, &format!("/v1/users/{admin}"), &access))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await, json!({ "message": "Insufficient rights" }));

    let response = app.call(bearer(Method::GET, "/v1/admin/users", &access)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn moderator_reads_but_cannot_delete_others() {
    let app = TestApp::new();
    let target = app.seed("ann@example.com", Role::Customer, true);
    app.seed("mod@example.com", Role::Moderator, true);
    let (access, _) = app.login("mod@example.com").await;
    let uri = format!("/v1/users/{target}");

    let response = app.call(bearer(Method::GET, &uri, &access)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.call(bearer(Method::DELETE, &uri, &access)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.state.users.get(target).is_ok());
}

#[tokio::test]
async fn unverified_caller_is_gated() {
    let app = TestApp::new();
    app.seed("fresh@example.com", Role::Customer, false);
    let (access, _) = app.login("fresh@example.com").await;

    let response = app.call(bearer(Method::GET, "/v1/users/me", &access)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await, json!({ "message": "User is not verified" }));

    let response = app
        .call(bearer(Method::POST, "/v1/auth/verification", &access))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn verified_caller_cannot_request_confirmation() {
    let app = TestApp::new();
    app.seed(ADMIN_EMAIL, Role::Admin, true);
    let (access, _) = app.login(ADMIN_EMAIL).await;

    let response = app
        .call(bearer(Method::POST, "/v1/auth/verification", &access))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({ "message": "User has to be not-verified" })
    );
}

#[tokio::test]
async fn change_password_checks_old_password() {
    let app = TestApp::new();
    app.seed("ann@example.com", Role::Customer, true);
    let (access, _) = app.login("ann@example.com").await;

    let request = |old: &str| {
        Request::builder()
            .method(Method::PATCH)
            .uri("/v1/users/me/change-password")
            .header(header::AUTHORIZATION, format!("Bearer {access}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "old_password": old, "new_password": "brand-new-pass" }).to_string(),
            ))
            .unwrap()
    };

    let response = app.call(request("not-my-password")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await, json!({ "message": "Password is incorrect" }));

    let response = app.call(request(PASSWORD)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn logout_expires_both_cookies() {
    let app = TestApp::new();
    let response = app
        .call(Request::post("/v1/auth/logout").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    for name in ["access_token=", "refresh_token="] {
        let cookie = cookies.iter().find(|c| c.starts_with(name)).unwrap();
        assert!(cookie.contains("Max-Age=-1"), "{cookie}");
    }
}
