// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login, refresh, email verification and confirmation letters.
//!
//! ## Verify email
//!
//! 1. authenticate the verification token
//! 2. make sure the subject still exists
//! 3. claim the token value in the ledger (at most once)
//! 4. mark the user verified
//! 5. send the "verified" letter in the background
//!
//! A replayed token fails at step 3, so the verified flag is never touched by
//! a replay. Letters are sent on a spawned task; their failures are logged
//! and never reach the caller.

use std::sync::Arc;

use tracing::{info, warn};

use super::claims::{EmailOwner, Identity, TokenClaims};
use super::context::RefreshSubject;
use super::password::{PasswordError, PasswordVerifier};
use super::token::{AccessTokens, RefreshTokens, VerificationTokens};
use super::AuthError;
use crate::mailer::Mailer;
use crate::storage::{ClaimOutcome, StorageError, UserRepository, VerificationLedger};

/// Tokens produced by a successful login.
#[derive(Debug, Clone)]
pub struct LoginTokens {
    pub access: String,
    pub refresh: String,
}

fn storage_error(err: StorageError) -> AuthError {
    match err {
        StorageError::NotFound => AuthError::UserNotFound,
        other => AuthError::internal(other),
    }
}

pub struct AuthFlow {
    users: Arc<dyn UserRepository>,
    ledger: Arc<dyn VerificationLedger>,
    passwords: Arc<dyn PasswordVerifier>,
    mailer: Arc<dyn Mailer>,
    access: Arc<AccessTokens>,
    refresh: Arc<RefreshTokens>,
    verification: Arc<VerificationTokens>,
}

impl AuthFlow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserRepository>,
        ledger: Arc<dyn VerificationLedger>,
        passwords: Arc<dyn PasswordVerifier>,
        mailer: Arc<dyn Mailer>,
        access: Arc<AccessTokens>,
        refresh: Arc<RefreshTokens>,
        verification: Arc<VerificationTokens>,
    ) -> Self {
        Self {
            users,
            ledger,
            passwords,
            mailer,
            access,
            refresh,
            verification,
        }
    }

    pub fn access_tokens(&self) -> &Arc<AccessTokens> {
        &self.access
    }

    pub fn refresh_tokens(&self) -> &Arc<RefreshTokens> {
        &self.refresh
    }

    /// Check credentials and issue an access and a refresh token.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub fn login(&self, email: &str, password: &str) -> Result<LoginTokens, AuthError> {
        let credentials = self.users.find_credentials(email).map_err(|e| match e {
            StorageError::NotFound => AuthError::BadCredentials,
            other => AuthError::internal(other),
        })?;

        self.passwords
            .compare(&credentials.password_hash, password)
            .map_err(|e| match e {
                PasswordError::Mismatch => AuthError::BadCredentials,
                other => AuthError::internal(other),
            })?;

        let identity = Identity {
            id: credentials.id,
            role: credentials.role,
            verified: credentials.verified,
        };
        let access = self.access.issue(identity)?;
        let refresh = self.refresh.issue(credentials.id)?;

        info!(user_id = credentials.id, role = %credentials.role, "User logged in");
        Ok(LoginTokens { access, refresh })
    }

    /// Issue a fresh access token from the user's current role and status.
    pub fn refresh(&self, RefreshSubject(user_id): RefreshSubject) -> Result<String, AuthError> {
        let status = self
            .users
            .find_role_and_verification(user_id)
            .map_err(storage_error)?;

        Ok(self.access.issue(Identity {
            id: user_id,
            role: status.role,
            verified: status.verified,
        })?)
    }

    pub fn verify_email(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.verification.authenticate(token)?;
        let user_id = claims.subject_id()?;

        self.users
            .find_role_and_verification(user_id)
            .map_err(storage_error)?;

        match self
            .ledger
            .claim(token, claims.expires_at())
            .map_err(AuthError::internal)?
        {
            ClaimOutcome::Claimed => {}
            ClaimOutcome::AlreadyClaimed => return Err(AuthError::TokenAlreadyUsed),
        }

        self.users.mark_verified(user_id).map_err(storage_error)?;
        info!(user_id, "User email verified");

        let mailer = self.mailer.clone();
        let email = claims.email;
        tokio::spawn(async move {
            if let Err(e) = mailer.send_verified(&email).await {
                warn!(user_id, error = %e, "Failed to send verification success letter");
            }
        });
        Ok(())
    }

    /// Look the account up by email and send a new confirmation letter.
    pub fn resend_confirmation(&self, email: &str) -> Result<(), AuthError> {
        let details = self
            .users
            .find_confirmation_details(email)
            .map_err(storage_error)?;
        if details.verified {
            return Err(AuthError::AlreadyActivated);
        }
        self.send_confirmation(details.id, &details.email, &details.first_name)
    }

    /// Issue a verification token and mail it in the background.
    pub fn send_confirmation(&self, user_id: i64, email: &str, name: &str) -> Result<(), AuthError> {
        let token = self.verification.issue(EmailOwner {
            id: user_id,
            email: email.to_string(),
        })?;

        let mailer = self.mailer.clone();
        let email = email.to_string();
        let name = name.to_string();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_confirmation(&token, &email, &name).await {
                warn!(user_id, error = %e, "Failed to send confirmation letter");
            }
        });
        Ok(())
    }
}
