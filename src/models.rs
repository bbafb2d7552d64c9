// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. Requests derive `Validate`
//! and are checked before any work is done; an invalid body is a
//! `400 Invalid arguments`.
//!
//! ## Model Categories
//!
//! - **Registration**: customer and provider sign-up
//! - **Auth**: login, confirmation letters, email verification
//! - **Users**: profile view and updates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::auth::Role;
use crate::storage::{PersonalInfoPatch, StoredUser};

pub const MIN_PASSWORD_LENGTH: u64 = 8;
pub const MAX_PASSWORD_LENGTH: u64 = 64;

/// Digits only, optionally with a leading `+`, 7 to 15 digits.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if (7..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_phone"))
    }
}

/// At least 5 digits, nothing else.
pub fn validate_personal_id(number: &str) -> Result<(), ValidationError> {
    if number.len() >= 5 && number.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_personal_id"))
    }
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

// =============================================================================
// Registration
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterCustomerRequest {
    #[validate(email, length(max = 40))]
    pub email: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone_number: String,
    #[validate(length(min = 2, max = 30))]
    pub first_name: String,
    #[validate(length(min = 2, max = 30))]
    pub last_name: String,
    #[validate(length(min = MIN_PASSWORD_LENGTH, max = MAX_PASSWORD_LENGTH))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterProviderRequest {
    #[validate(email, length(max = 40))]
    pub email: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone_number: String,
    #[validate(length(min = 2, max = 30))]
    pub first_name: String,
    #[validate(length(min = 2, max = 30))]
    pub last_name: String,
    #[validate(length(min = MIN_PASSWORD_LENGTH, max = MAX_PASSWORD_LENGTH))]
    pub password: String,
    /// National identity number; only its last 5 digits and a keyed digest are stored.
    #[validate(custom(function = "validate_personal_id"))]
    pub personal_id_number: String,
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = MAX_PASSWORD_LENGTH))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ResendConfirmationRequest {
    #[validate(email)]
    pub email: String,
}

/// Query string of the link in the confirmation letter.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct VerifyEmailQuery {
    pub token: String,
}

// =============================================================================
// Users
// =============================================================================

/// Public view of an account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UserResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: String,
    pub role: Role,
    /// Whether the email address has been confirmed.
    pub verified: bool,
    /// Last digits of a provider's personal id number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_id_preview: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<StoredUser> for UserResponse {
    fn from(user: StoredUser) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            phone_number: user.phone_number,
            email: user.email,
            role: user.role,
            verified: user.verified,
            personal_id_preview: user.personal_id_preview,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
}

/// Partial profile update; omitted fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(email, length(max = 40))]
    pub email: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone_number: Option<String>,
    #[validate(length(min = 2, max = 30))]
    pub first_name: Option<String>,
    #[validate(length(min = 2, max = 30))]
    pub last_name: Option<String>,
}

impl From<UpdateUserRequest> for PersonalInfoPatch {
    fn from(req: UpdateUserRequest) -> Self {
        Self {
            email: req.email,
            phone_number: req.phone_number,
            first_name: req.first_name,
            last_name: req.last_name,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, max = MAX_PASSWORD_LENGTH))]
    pub old_password: String,
    #[validate(length(min = MIN_PASSWORD_LENGTH, max = MAX_PASSWORD_LENGTH))]
    pub new_password: String,
}
