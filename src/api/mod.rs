// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP surface.
//!
//! Route groups and the auth layers wrapping them:
//!
//! | Group | Layers (outermost first) |
//! |-------|--------------------------|
//! | `/v1/auth/*` public | none |
//! | `/v1/auth/refresh` | refresh-token authentication |
//! | `/v1/auth/verification` | access authentication, verification gate (unverified) |
//! | `/v1/users/{id}/*` | access authentication, verification gate (verified), ownership policy |
//! | `/v1/admin/*` | access authentication, role policy (admin) |
//! | `/health/*`, `/docs` | none |

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request},
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{
        middleware::{authenticate, authenticate_refresh},
        rbac::{require_role, require_self_or_role, require_verification},
        OwnershipPolicy, Role, RolePolicy, VerificationGate,
    },
    models::{
        ChangePasswordRequest, ErrorResponse, LoginRequest, RegisterCustomerRequest,
        RegisterProviderRequest, ResendConfirmationRequest, UpdateUserRequest, UserListResponse,
        UserResponse,
    },
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod extract;
pub mod health;
pub mod users;

/// Path parameter naming the target user.
const USER_ID_PARAM: &str = "id";

pub fn router(state: AppState) -> Router {
    let access_auth = from_fn_with_state(state.access_tokens.clone(), authenticate);

    let public = Router::new()
        .route("/auth/register/customer", post(auth::register_customer))
        .route("/auth/register/provider", post(auth::register_provider))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/verify", get(auth::verify_email))
        .route(
            "/auth/resend-confirmation",
            post(auth::resend_confirmation),
        );

    let refresh = Router::new()
        .route("/auth/refresh", post(auth::refresh))
        .route_layer(from_fn_with_state(
            state.refresh_tokens.clone(),
            authenticate_refresh,
        ));

    let verification = Router::new()
        .route("/auth/verification", post(auth::resend_own_confirmation))
        .route_layer(from_fn_with_state(
            VerificationGate::UNVERIFIED,
            require_verification,
        ))
        .route_layer(access_auth.clone());

    let self_or_staff = from_fn_with_state(
        OwnershipPolicy::self_or(USER_ID_PARAM, &[Role::Admin, Role::Moderator]),
        require_self_or_role,
    );
    let self_or_admin = from_fn_with_state(
        OwnershipPolicy::self_or(USER_ID_PARAM, &[Role::Admin]),
        require_self_or_role,
    );

    let users = Router::new()
        .route(
            "/users/{id}",
            get(users::get_user).route_layer(self_or_staff).merge(
                patch(users::update_user)
                    .delete(users::delete_user)
                    .route_layer(self_or_admin.clone()),
            ),
        )
        .route(
            "/users/{id}/change-password",
            patch(users::change_password).route_layer(self_or_admin),
        )
        .route_layer(from_fn_with_state(
            VerificationGate::VERIFIED,
            require_verification,
        ))
        .route_layer(access_auth.clone());

    let admin = Router::new()
        .route("/admin/users", get(admin::list_users))
        .route_layer(from_fn_with_state(
            RolePolicy::allow(&[Role::Admin]),
            require_role,
        ))
        .route_layer(access_auth);

    let v1_routes = Router::new()
        .merge(public)
        .merge(refresh)
        .merge(verification)
        .merge(users)
        .merge(admin);

    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .nest("/v1", v1_routes)
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        }))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors)
}

/// Permissive when no origins are configured; otherwise the listed origins
/// with credentials, so browsers send the token cookies.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_customer,
        auth::register_provider,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::verify_email,
        auth::resend_confirmation,
        auth::resend_own_confirmation,
        users::get_user,
        users::update_user,
        users::change_password,
        users::delete_user,
        admin::list_users,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            ErrorResponse,
            RegisterCustomerRequest,
            RegisterProviderRequest,
            LoginRequest,
            ResendConfirmationRequest,
            UpdateUserRequest,
            ChangePasswordRequest,
            UserResponse,
            UserListResponse,
            Role,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login, tokens and email verification"),
        (name = "Users", description = "Account profile management"),
        (name = "Admin", description = "Administrative views"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::mailer::LogMailer;
    use crate::storage::AccountDatabase;
    use axum::{body::to_bytes, http::StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state(dir: &std::path::Path) -> AppState {
        let config = AppConfig::from_lookup(|name| {
            match name {
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
        let db = Arc::new(AccountDatabase::open_in(dir).unwrap());
        let mailer = Arc::new(LogMailer::new(config.public_base_url.clone()));
        AppState::new(&config, db, mailer).unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn liveness_and_readiness_are_ok() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let req = Request::get("/health/live").body(Body::empty()).unwrap();
        let (status, _) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::OK);

        let req = Request::get("/health/ready").body(Body::empty()).unwrap();
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#""database":"ok""#));
    }

    #[tokio::test]
    async fn protected_groups_require_authorization_header() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        for (method, uri) in [
            (Method::GET, "/v1/users/me"),
            (Method::GET, "/v1/admin/users"),
            (Method::POST, "/v1/auth/refresh"),
            (Method::POST, "/v1/auth/verification"),
        ] {
            let req = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let (status, body) = send(app.clone(), req).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body, r#"{"message":"Authorization header is missing"}"#);
        }
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let req = Request::get("/health/live").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn invalid_body_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let req = Request::post("/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"email":"nope","password":"x"}"#))
            .unwrap();
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"{"message":"Invalid arguments"}"#);
    }

    #[test]
    fn openapi_lists_auth_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/v1/auth/login"));
        assert!(doc.paths.paths.contains_key("/v1/users/{id}/change-password"));
    }
}
