// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request-scoped identity.
//!
//! The authentication middleware inserts a [`RequestIdentity`] into the
//! request extensions; authorization policies read it and may record the
//! resolved target user. Handlers pull the pieces they need with the
//! extractors below:
//!
//! ```rust,ignore
//! async fn get_user(
//!     TargetUser(user_id): TargetUser,
//!     State(state): State<AppState>,
//! ) -> Result<Json<UserResponse>, ApiError> {
//!     // user_id was resolved by the self-or-role policy ("me" included)
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::claims::Identity;
use super::AuthError;

/// Identity of the authenticated caller plus the user a route acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    identity: Identity,
    target: Option<i64>,
}

impl RequestIdentity {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            target: None,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// User id resolved by the ownership policy, if one ran.
    pub fn target(&self) -> Option<i64> {
        self.target
    }

    pub(crate) fn set_target(&mut self, user_id: i64) {
        self.target = Some(user_id);
    }
}

/// Subject of an authenticated refresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSubject(pub i64);

/// Extracts the authenticated caller.
pub struct CurrentUser(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestIdentity>()
            .map(|ctx| CurrentUser(ctx.identity))
            .ok_or(AuthError::AuthenticationNotApplied)
    }
}

/// Extracts the user id resolved by the self-or-role policy.
pub struct TargetUser(pub i64);

impl<S: Send + Sync> FromRequestParts<S> for TargetUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<RequestIdentity>()
            .ok_or(AuthError::AuthenticationNotApplied)?;
        ctx.target()
            .map(TargetUser)
            .ok_or_else(|| AuthError::internal("route has no ownership policy"))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RefreshSubject {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RefreshSubject>()
            .copied()
            .ok_or(AuthError::AuthenticationNotApplied)
    }
}
