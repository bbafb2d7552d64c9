// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer-token authentication middleware.
//!
//! Each request moves through the same states:
//!
//! 1. no `Authorization` header → `MissingAuthorizationHeader`
//! 2. header without `Bearer ` → `MissingBearerToken`
//! 3. token rejected → the token error, unchanged
//! 4. role outside the known set → `InvalidRole`
//! 5. otherwise the identity is stored and the next handler runs
//!
//! Failures short-circuit; nothing is written to the request and no
//! downstream handler executes.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/protected", get(protected_handler))
//!     .route_layer(axum::middleware::from_fn_with_state(
//!         state.access_tokens.clone(),
//!         authenticate,
//!     ));
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::claims::Identity;
use super::context::{RefreshSubject, RequestIdentity};
use super::token::{AccessTokens, RefreshTokens};
use super::{AuthError, Role};

/// Extract the raw token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthorizationHeader)?;

    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingBearerToken)
}

/// Authenticate an access token carried by `headers`.
pub fn authenticate_access(headers: &HeaderMap, tokens: &AccessTokens) -> Result<Identity, AuthError> {
    let claims = tokens.authenticate(bearer_token(headers)?)?;
    let role = claims
        .role
        .parse::<Role>()
        .map_err(|_| AuthError::InvalidRole)?;

    Ok(Identity {
        id: claims.subject_id()?,
        role,
        verified: claims.verified,
    })
}

/// Authenticate a refresh token carried by `headers`.
pub fn authenticate_refresh_token(
    headers: &HeaderMap,
    tokens: &RefreshTokens,
) -> Result<RefreshSubject, AuthError> {
    let claims = tokens.authenticate(bearer_token(headers)?)?;
    Ok(RefreshSubject(claims.subject_id()?))
}

/// Access-token middleware: populates [`RequestIdentity`].
pub async fn authenticate(
    State(tokens): State<Arc<AccessTokens>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate_access(request.headers(), &tokens) {
        Ok(identity) => {
            request
                .extensions_mut()
                .insert(RequestIdentity::new(identity));
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Refresh-token middleware: populates [`RefreshSubject`].
pub async fn authenticate_refresh(
    State(tokens): State<Arc<RefreshTokens>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate_refresh_token(request.headers(), &tokens) {
        Ok(subject) => {
            request.extensions_mut().insert(subject);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
