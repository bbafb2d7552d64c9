// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{
    AccessTokens, Argon2Passwords, AuthFlow, PasswordError, PasswordVerifier, RefreshTokens,
    TokenManager, VerificationTokens,
};
use crate::config::AppConfig;
use crate::mailer::{HttpMailer, LogMailer, Mailer};
use crate::storage::{AccountDatabase, UserRepository};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<AccountDatabase>,
    pub users: Arc<dyn UserRepository>,
    pub passwords: Arc<dyn PasswordVerifier>,
    pub access_tokens: Arc<AccessTokens>,
    pub refresh_tokens: Arc<RefreshTokens>,
    pub auth_flow: Arc<AuthFlow>,
    /// HMAC key for provider personal id digests.
    pub personal_id_key: Arc<[u8]>,
    /// Allowed CORS origins; empty means permissive.
    pub cors_origins: Arc<[String]>,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        db: Arc<AccountDatabase>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, PasswordError> {
        let passwords: Arc<dyn PasswordVerifier> = Arc::new(Argon2Passwords::new(config.argon2)?);
        let access_tokens: Arc<AccessTokens> = Arc::new(TokenManager::new(
            config.access_secret.as_bytes(),
            config.access_ttl,
        ));
        let refresh_tokens: Arc<RefreshTokens> = Arc::new(TokenManager::new(
            config.refresh_secret.as_bytes(),
            config.refresh_ttl,
        ));
        let verification_tokens: Arc<VerificationTokens> = Arc::new(TokenManager::new(
            config.verification_secret.as_bytes(),
            config.verification_ttl,
        ));

        let auth_flow = AuthFlow::new(
            db.clone(),
            db.clone(),
            passwords.clone(),
            mailer,
            access_tokens.clone(),
            refresh_tokens.clone(),
            verification_tokens,
        );

        Ok(Self {
            users: db.clone(),
            db,
            passwords,
            access_tokens,
            refresh_tokens,
            auth_flow: Arc::new(auth_flow),
            personal_id_key: config.personal_id_key.as_bytes().into(),
            cors_origins: config.cors_origins.clone().into(),
        })
    }
}

/// Relay mailer when `MAIL_API_URL` is configured, log mailer otherwise.
pub fn mailer_from_config(config: &AppConfig) -> Arc<dyn Mailer> {
    match &config.mail_relay {
        Some(relay) => Arc::new(HttpMailer::new(
            relay.endpoint.clone(),
            relay.api_key.clone(),
            config.mail_from.clone(),
            config.public_base_url.clone(),
        )),
        None => Arc::new(LogMailer::new(config.public_base_url.clone())),
    }
}
