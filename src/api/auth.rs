// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registration, login, token refresh and email verification endpoints.
//!
//! Access and refresh tokens travel in `HttpOnly; Secure; SameSite=Lax`
//! cookies named [`ACCESS_COOKIE`] and [`REFRESH_COOKIE`].

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{info, warn};

use super::extract::{ValidJson, ValidQuery};
use crate::{
    auth::{CurrentUser, RefreshSubject, Role},
    error::ApiError,
    models::{
        ErrorResponse, LoginRequest, RegisterCustomerRequest, RegisterProviderRequest,
        ResendConfirmationRequest, UserResponse, VerifyEmailQuery,
    },
    state::AppState,
    storage::{NewUser, PersonalId, StoredUser},
};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Digits of the personal id number kept in clear.
const PERSONAL_ID_PREVIEW_LEN: usize = 5;

type HmacSha256 = Hmac<Sha256>;

fn token_cookie(name: &'static str, token: String, ttl: chrono::Duration) -> Cookie<'static> {
    Cookie::build((name, token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(ttl.num_seconds()))
        .build()
}

fn expired_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(-1))
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .build()
}

/// Reduce a personal id number to its stored form.
pub fn personal_id(number: &str, key: &[u8]) -> Result<PersonalId, ApiError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(ApiError::internal)?;
    mac.update(number.as_bytes());
    let digest = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());
    let skip = number.chars().count().saturating_sub(PERSONAL_ID_PREVIEW_LEN);
    let preview = number.chars().skip(skip).collect();
    Ok(PersonalId { preview, digest })
}

/// Store a new account and mail its confirmation letter.
fn register(state: &AppState, new_user: NewUser) -> Result<StoredUser, ApiError> {
    let user = state.users.create(new_user)?;
    info!(user_id = user.id, role = %user.role, "User registered");

    // The account exists either way; a lost letter can be re-requested.
    if let Err(e) = state
        .auth_flow
        .send_confirmation(user.id, &user.email, &user.first_name)
    {
        warn!(user_id = user.id, error = %e, "Failed to issue confirmation letter");
    }
    Ok(user)
}

#[utoipa::path(
    post,
    path = "/v1/auth/register/customer",
    request_body = RegisterCustomerRequest,
    tag = "Auth",
    responses(
        (status = 201, body = UserResponse),
        (status = 400, body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
pub async fn register_customer(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<RegisterCustomerRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let password_hash = state
        .passwords
        .hash(&request.password)
        .map_err(ApiError::internal)?;

    let user = register(
        &state,
        NewUser {
            first_name: request.first_name,
            last_name: request.last_name,
            phone_number: request.phone_number,
            email: request.email,
            password_hash,
            role: Role::Customer,
            personal_id: None,
        },
    )?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[utoipa::path(
    post,
    path = "/v1/auth/register/provider",
    request_body = RegisterProviderRequest,
    tag = "Auth",
    responses(
        (status = 201, body = UserResponse),
        (status = 400, body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
pub async fn register_provider(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<RegisterProviderRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let personal_id = personal_id(&request.personal_id_number, &state.personal_id_key)?;
    let password_hash = state
        .passwords
        .hash(&request.password)
        .map_err(ApiError::internal)?;

    let user = register(
        &state,
        NewUser {
            first_name: request.first_name,
            last_name: request.last_name,
            phone_number: request.phone_number,
            email: request.email,
            password_hash,
            role: Role::Provider,
            personal_id: Some(personal_id),
        },
    )?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Sets both token cookies.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "access_token and refresh_token cookies set"),
        (status = 401, body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidJson(request): ValidJson<LoginRequest>,
) -> Result<(CookieJar, StatusCode), ApiError> {
    let tokens = state.auth_flow.login(&request.email, &request.password)?;

    let jar = jar
        .add(token_cookie(
            ACCESS_COOKIE,
            tokens.access,
            state.access_tokens.ttl(),
        ))
        .add(token_cookie(
            REFRESH_COOKIE,
            tokens.refresh,
            state.refresh_tokens.ttl(),
        ));
    Ok((jar, StatusCode::OK))
}

/// Requires `Authorization: Bearer <refresh token>`; replaces the access cookie.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    tag = "Auth",
    responses(
        (status = 200, description = "access_token cookie replaced"),
        (status = 401, body = ErrorResponse),
        (status = 404, description = "User no longer exists", body = ErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    subject: RefreshSubject,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), ApiError> {
    let access = state.auth_flow.refresh(subject)?;
    let jar = jar.add(token_cookie(
        ACCESS_COOKIE,
        access,
        state.access_tokens.ttl(),
    ));
    Ok((jar, StatusCode::OK))
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Both token cookies expired"))
)]
pub async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    let jar = jar
        .add(expired_cookie(ACCESS_COOKIE))
        .add(expired_cookie(REFRESH_COOKIE));
    (jar, StatusCode::OK)
}

#[utoipa::path(
    get,
    path = "/v1/auth/verify",
    params(VerifyEmailQuery),
    tag = "Auth",
    responses(
        (status = 200, description = "Email verified"),
        (status = 401, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 409, description = "Token already used", body = ErrorResponse)
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<VerifyEmailQuery>,
) -> Result<StatusCode, ApiError> {
    state.auth_flow.verify_email(&query.token)?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/v1/auth/resend-confirmation",
    request_body = ResendConfirmationRequest,
    tag = "Auth",
    responses(
        (status = 202, description = "Confirmation letter queued"),
        (status = 404, body = ErrorResponse),
        (status = 409, description = "Account already activated", body = ErrorResponse)
    )
)]
pub async fn resend_confirmation(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<ResendConfirmationRequest>,
) -> Result<StatusCode, ApiError> {
    state.auth_flow.resend_confirmation(&request.email)?;
    Ok(StatusCode::ACCEPTED)
}

/// Confirmation letter for the signed-in, not yet verified caller.
#[utoipa::path(
    post,
    path = "/v1/auth/verification",
    tag = "Auth",
    responses(
        (status = 202, description = "Confirmation letter queued"),
        (status = 401, body = ErrorResponse),
        (status = 403, description = "Already verified", body = ErrorResponse)
    )
)]
pub async fn resend_own_confirmation(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<StatusCode, ApiError> {
    let user = state.users.get(identity.id)?;
    state
        .auth_flow
        .send_confirmation(user.id, &user.email, &user.first_name)?;
    Ok(StatusCode::ACCEPTED)
}
