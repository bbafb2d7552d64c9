// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only endpoints. The router layers `RolePolicy::allow(&[Role::Admin])`
//! over everything here.

use axum::{extract::State, Json};

use crate::{
    error::ApiError,
    models::{ErrorResponse, UserListResponse},
    state::AppState,
};

/// List every account in id order.
#[utoipa::path(
    get,
    path = "/v1/admin/users",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, body = UserListResponse),
        (status = 401, body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    )
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<UserListResponse>, ApiError> {
    let users = state.users.list()?;
    Ok(Json(UserListResponse {
        users: users.into_iter().map(Into::into).collect(),
    }))
}
