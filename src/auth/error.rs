// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use super::token::TokenError;

/// Client-facing message for every internal failure.
pub const INTERNAL_MESSAGE: &str = "Internal server error";

/// Every way the auth pipeline or the auth flows can refuse a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Token failed to decode, verify, or was expired
    Token(TokenError),
    /// No `Authorization` header present
    MissingAuthorizationHeader,
    /// `Authorization` header without a `Bearer ` prefix
    MissingBearerToken,
    /// Validly signed token naming a role outside the known set
    InvalidRole,
    /// Unknown email or wrong password on login
    BadCredentials,
    /// Wrong current password on password change
    IncorrectPassword,
    /// Role not allowed for this route
    InsufficientRights,
    /// Route requires a verified account
    NotVerified,
    /// Route requires an account that is not verified yet
    AlreadyVerified,
    /// Subject no longer exists
    UserNotFound,
    /// Verification token was already consumed
    TokenAlreadyUsed,
    /// Account is already verified
    AlreadyActivated,
    /// An authorization policy ran without authentication in front of it
    AuthenticationNotApplied,
    /// Anything else; the cause is logged, never returned
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl AuthError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Token(TokenError::Signing(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Token(_)
            | AuthError::MissingAuthorizationHeader
            | AuthError::MissingBearerToken
            | AuthError::InvalidRole
            | AuthError::BadCredentials
            | AuthError::IncorrectPassword => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientRights | AuthError::NotVerified | AuthError::AlreadyVerified => {
                StatusCode::FORBIDDEN
            }
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::TokenAlreadyUsed | AuthError::AlreadyActivated => StatusCode::CONFLICT,
            AuthError::AuthenticationNotApplied | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }

    pub fn internal(cause: impl std::fmt::Display) -> Self {
        AuthError::Internal(cause.to_string())
    }

    /// Message safe to show the caller.
    pub fn client_message(&self) -> String {
        if self.is_internal() {
            INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        AuthError::Token(err)
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Token(TokenError::Expired) => write!(f, "Token has expired"),
            AuthError::Token(TokenError::Signing(cause)) => write!(f, "Token signing failed: {cause}"),
            AuthError::Token(_) => write!(f, "Invalid token"),
            AuthError::MissingAuthorizationHeader => write!(f, "Authorization header is missing"),
            AuthError::MissingBearerToken => write!(f, "Bearer token is missing"),
            AuthError::InvalidRole => write!(f, "Invalid role"),
            AuthError::BadCredentials => write!(f, "Email or Password is incorrect"),
            AuthError::IncorrectPassword => write!(f, "Password is incorrect"),
            AuthError::InsufficientRights => write!(f, "Insufficient rights"),
            AuthError::NotVerified => write!(f, "User is not verified"),
            AuthError::AlreadyVerified => write!(f, "User has to be not-verified"),
            AuthError::UserNotFound => write!(f, "User not found"),
            AuthError::TokenAlreadyUsed => write!(f, "User verification token already used"),
            AuthError::AlreadyActivated => write!(f, "User is already activated"),
            AuthError::AuthenticationNotApplied => {
                write!(f, "Authorization policy applied without authentication")
            }
            AuthError::Internal(cause) => write!(f, "Internal authentication error: {cause}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_internal() {
            error!(error = %self, "auth request failed");
        }
        let body = Json(ErrorBody {
            message: self.client_message(),
        });
        (status, body).into_response()
    }
}
