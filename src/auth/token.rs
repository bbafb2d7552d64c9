// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HMAC-signed JWT engine shared by all token kinds.
//!
//! [`TokenCodec`] signs and verifies with one secret. [`TokenManager`] adds a
//! fixed TTL and a claim shape, and is instantiated once per token kind:
//! [`AccessTokens`], [`RefreshTokens`], [`VerificationTokens`].
//!
//! Managers are immutable after construction and shared behind `Arc`.

use std::marker::PhantomData;

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::Deserialize;
use tracing::debug;

use super::claims::{AccessClaims, RefreshClaims, TokenClaims, VerificationClaims};

/// Why a token could not be produced or accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token has expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Only the expiry, read before the signature is checked.
#[derive(Deserialize)]
struct UnverifiedExpiry {
    exp: i64,
}

/// Symmetric (HS256) encoder/decoder bound to one secret.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn encode<C: TokenClaims>(&self, claims: &C) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Decode and verify a token.
    ///
    /// Expiry is checked first so an expired token reports `Expired` even
    /// when its signature would not verify.
    pub fn decode<C: TokenClaims>(&self, token: &str) -> Result<C, TokenError> {
        let peek = jsonwebtoken::dangerous::insecure_decode::<UnverifiedExpiry>(token)
            .map_err(|_| TokenError::Malformed)?;
        if peek.claims.exp < Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        decode::<C>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                _ => TokenError::Malformed,
            })
    }
}

/// Issues and authenticates one kind of token with a fixed TTL.
pub struct TokenManager<C> {
    codec: TokenCodec,
    ttl: Duration,
    _claims: PhantomData<fn() -> C>,
}

pub type AccessTokens = TokenManager<AccessClaims>;
pub type RefreshTokens = TokenManager<RefreshClaims>;
pub type VerificationTokens = TokenManager<VerificationClaims>;

impl<C: TokenClaims> TokenManager<C> {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            codec: TokenCodec::new(secret),
            ttl,
            _claims: PhantomData,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `subject` that expires `ttl` from now.
    pub fn issue(&self, subject: C::Subject) -> Result<String, TokenError> {
        let exp = Utc::now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::Signing("token expiry is out of range".to_string()))?
            .timestamp();
        self.codec.encode(&C::from_subject(subject, exp))
    }

    pub fn authenticate(&self, token: &str) -> Result<C, TokenError> {
        self.codec.decode(token).inspect_err(|e| {
            debug!(reason = %e, "token rejected");
        })
    }
}
