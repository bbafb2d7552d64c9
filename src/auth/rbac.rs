// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role-based authorization policies.
//!
//! Three independent policies read the [`RequestIdentity`] written by the
//! authentication middleware:
//!
//! - [`RolePolicy`]: role allow-list
//! - [`VerificationGate`]: requires the account to be (or not be) verified
//! - [`OwnershipPolicy`]: self-or-role access to a `{id}` path parameter
//!
//! They must be layered inside authentication. With `route_layer` the last
//! layer added runs first:
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/admin/users", get(list_users))
//!     .route_layer(from_fn_with_state(RolePolicy::allow(&[Role::Admin]), require_role))
//!     .route_layer(from_fn_with_state(access_tokens, authenticate));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::PathRejection, Path, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::claims::Identity;
use super::context::RequestIdentity;
use super::{AuthError, Role};

/// Path alias for the caller's own id.
pub const SELF_ALIAS: &str = "me";

/// Allow only the listed roles.
#[derive(Debug, Clone)]
pub struct RolePolicy {
    allowed: Arc<[Role]>,
}

impl RolePolicy {
    pub fn allow(roles: &[Role]) -> Self {
        Self {
            allowed: roles.into(),
        }
    }
}

/// Require the verification flag to equal `required`.
#[derive(Debug, Clone, Copy)]
pub struct VerificationGate {
    pub required: bool,
}

impl VerificationGate {
    pub const VERIFIED: Self = Self { required: true };
    pub const UNVERIFIED: Self = Self { required: false };
}

/// Allow access to the user named by a path parameter when it is the caller,
/// or when the caller holds one of the listed roles.
#[derive(Debug, Clone)]
pub struct OwnershipPolicy {
    param: &'static str,
    allowed: Arc<[Role]>,
}

impl OwnershipPolicy {
    pub fn self_or(param: &'static str, roles: &[Role]) -> Self {
        Self {
            param,
            allowed: roles.into(),
        }
    }
}

fn identity_of(ctx: Option<&RequestIdentity>) -> Result<&Identity, AuthError> {
    ctx.map(RequestIdentity::identity)
        .ok_or(AuthError::AuthenticationNotApplied)
}

pub fn authorize_role(ctx: Option<&RequestIdentity>, allowed: &[Role]) -> Result<(), AuthError> {
    let identity = identity_of(ctx)?;
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(AuthError::InsufficientRights)
    }
}

pub fn check_verification(ctx: Option<&RequestIdentity>, required: bool) -> Result<(), AuthError> {
    let identity = identity_of(ctx)?;
    match (identity.verified, required) {
        (actual, wanted) if actual == wanted => Ok(()),
        (_, true) => Err(AuthError::NotVerified),
        (_, false) => Err(AuthError::AlreadyVerified),
    }
}

/// Resolve the user a request targets, in order:
///
/// 1. `"me"` → the caller
/// 2. the caller's own id → the caller
/// 3. any other value → that id, only for `allowed` roles
pub fn resolve_target(identity: &Identity, param: &str, allowed: &[Role]) -> Result<i64, AuthError> {
    if param == SELF_ALIAS {
        return Ok(identity.id);
    }
    if param == identity.id.to_string() {
        return Ok(identity.id);
    }
    if !allowed.contains(&identity.role) {
        return Err(AuthError::InsufficientRights);
    }
    param
        .parse::<i64>()
        .map_err(|e| AuthError::internal(format!("unparsable user id {param:?}: {e}")))
}

pub async fn require_role(
    State(policy): State<RolePolicy>,
    request: Request,
    next: Next,
) -> Response {
    match authorize_role(request.extensions().get(), &policy.allowed) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

pub async fn require_verification(
    State(gate): State<VerificationGate>,
    request: Request,
    next: Next,
) -> Response {
    match check_verification(request.extensions().get(), gate.required) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

pub async fn require_self_or_role(
    State(policy): State<OwnershipPolicy>,
    params: Result<Path<HashMap<String, String>>, PathRejection>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(ctx) = request.extensions_mut().get_mut::<RequestIdentity>() else {
        return AuthError::AuthenticationNotApplied.into_response();
    };

    let param = match params {
        Ok(Path(params)) => params.get(policy.param).cloned(),
        Err(e) => return AuthError::internal(e).into_response(),
    };
    let Some(param) = param else {
        return AuthError::internal(format!("route has no {:?} parameter", policy.param))
            .into_response();
    };

    match resolve_target(ctx.identity(), &param, &policy.allowed) {
        Ok(user_id) => {
            ctx.set_target(user_id);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
