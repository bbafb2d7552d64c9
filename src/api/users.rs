// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account endpoints under `/v1/users/{id}`.
//!
//! `{id}` is a numeric user id or `me`. The ownership policy layered on each
//! route resolves it into a [`TargetUser`] before the handler runs.

use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use super::extract::ValidJson;
use crate::{
    auth::{AuthError, PasswordError, TargetUser},
    error::ApiError,
    models::{ChangePasswordRequest, ErrorResponse, UpdateUserRequest, UserResponse},
    state::AppState,
    storage::{PersonalInfoPatch, StorageError},
};

#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    tag = "Users",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "User id or `me`")),
    responses(
        (status = 200, body = UserResponse),
        (status = 401, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    TargetUser(user_id): TargetUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.get(user_id)?;
    Ok(Json(user.into()))
}

/// Changing the email keeps the verified flag as it is.
#[utoipa::path(
    patch,
    path = "/v1/users/{id}",
    tag = "Users",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "User id or `me`")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, body = UserResponse),
        (status = 400, description = "Invalid or empty update", body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    TargetUser(user_id): TargetUser,
    ValidJson(request): ValidJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let patch = PersonalInfoPatch::from(request);
    if patch.is_empty() {
        return Err(StorageError::NoChanges.into());
    }
    let user = state.users.update_personal_info(user_id, patch)?;
    info!(user_id, "User profile updated");
    Ok(Json(user.into()))
}

#[utoipa::path(
    patch,
    path = "/v1/users/{id}/change-password",
    tag = "Users",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "User id or `me`")),
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 401, description = "Old password is incorrect", body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    TargetUser(user_id): TargetUser,
    ValidJson(request): ValidJson<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let user = state.users.get(user_id)?;

    match state
        .passwords
        .compare(&user.password_hash, &request.old_password)
    {
        Ok(()) => {}
        Err(PasswordError::Mismatch) => return Err(AuthError::IncorrectPassword.into()),
        Err(e) => return Err(ApiError::internal(e)),
    }

    let password_hash = state
        .passwords
        .hash(&request.new_password)
        .map_err(ApiError::internal)?;
    state.users.update_password_hash(user_id, &password_hash)?;
    info!(user_id, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// Issued tokens stay valid until they expire; refresh fails once the account is gone.
#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    tag = "Users",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "User id or `me`")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    TargetUser(user_id): TargetUser,
) -> Result<StatusCode, ApiError> {
    state.users.delete(user_id)?;
    info!(user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
