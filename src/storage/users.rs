// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User records and the repository interface the services depend on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StorageResult;
use crate::auth::Role;

/// Persisted user row (JSON in the `users` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub verified: bool,
    /// Last characters of a provider's personal id number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_id_preview: Option<String>,
    /// Keyed digest of a provider's personal id number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_id_digest: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Provider identity document, already reduced to what may be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalId {
    pub preview: String,
    pub digest: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub personal_id: Option<PersonalId>,
}

/// Fields needed to check a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub id: i64,
    pub password_hash: String,
    pub role: Role,
    pub verified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountStatus {
    pub role: Role,
    pub verified: bool,
}

/// Fields needed to (re)send a confirmation letter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationDetails {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub verified: bool,
}

/// Partial profile update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonalInfoPatch {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl PersonalInfoPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.phone_number.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
    }

    pub(crate) fn apply(self, user: &mut StoredUser) {
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(phone_number) = self.phone_number {
            user.phone_number = phone_number;
        }
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
    }
}

/// User persistence. Every lookup of a missing row is `StorageError::NotFound`.
pub trait UserRepository: Send + Sync {
    /// Insert a user; emails are unique case-insensitively.
    fn create(&self, user: NewUser) -> StorageResult<StoredUser>;

    fn find_credentials(&self, email: &str) -> StorageResult<Credentials>;

    fn find_role_and_verification(&self, id: i64) -> StorageResult<AccountStatus>;

    fn find_confirmation_details(&self, email: &str) -> StorageResult<ConfirmationDetails>;

    fn get(&self, id: i64) -> StorageResult<StoredUser>;

    fn list(&self) -> StorageResult<Vec<StoredUser>>;

    fn update_personal_info(&self, id: i64, patch: PersonalInfoPatch) -> StorageResult<StoredUser>;

    fn update_password_hash(&self, id: i64, password_hash: &str) -> StorageResult<()>;

    fn mark_verified(&self, id: i64) -> StorageResult<()>;

    fn delete(&self, id: i64) -> StorageResult<()>;
}
