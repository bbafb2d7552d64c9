// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claim shapes and the identity they carry.
//!
//! Each token kind carries exactly the fields its consumer needs:
//!
//! | Kind | Fields |
//! |------|--------|
//! | access | `sub`, `role`, `verified`, `exp` |
//! | refresh | `sub`, `exp` |
//! | verification | `sub`, `email`, `exp` |
//!
//! A refresh token never carries a role, so the refresh flow has to re-read
//! the current role and verification status from storage.
//!
//! Every shape denies unknown fields. The field sets differ pairwise, so a
//! token of one kind fails to decode as another even when secrets collide.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::roles::Role;
use super::token::TokenError;

/// Verified identity of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// Stable user id.
    pub id: i64,
    pub role: Role,
    /// Whether the account email has been confirmed.
    pub verified: bool,
}

/// A claim payload that can be signed by a [`TokenManager`](super::token::TokenManager).
///
/// `Subject` is what the issuer is handed; the manager adds the expiry.
pub trait TokenClaims: Serialize + DeserializeOwned + Send + Sync + 'static {
    type Subject;

    fn from_subject(subject: Self::Subject, exp: i64) -> Self;

    /// Expiry as a unix timestamp (seconds).
    fn expires_at(&self) -> i64;
}

fn parse_subject(sub: &str) -> Result<i64, TokenError> {
    sub.parse().map_err(|_| TokenError::Malformed)
}

/// Claims of the short-lived access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessClaims {
    pub sub: String,
    /// Kept as a raw string so an unknown role surfaces as its own failure
    /// instead of a generic decode error.
    pub role: String,
    pub verified: bool,
    pub exp: i64,
}

impl AccessClaims {
    pub fn subject_id(&self) -> Result<i64, TokenError> {
        parse_subject(&self.sub)
    }
}

impl TokenClaims for AccessClaims {
    type Subject = Identity;

    fn from_subject(identity: Identity, exp: i64) -> Self {
        Self {
            sub: identity.id.to_string(),
            role: identity.role.as_str().to_string(),
            verified: identity.verified,
            exp,
        }
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// Claims of the long-lived refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshClaims {
    pub sub: String,
    pub exp: i64,
}

impl RefreshClaims {
    pub fn subject_id(&self) -> Result<i64, TokenError> {
        parse_subject(&self.sub)
    }
}

impl TokenClaims for RefreshClaims {
    type Subject = i64;

    fn from_subject(user_id: i64, exp: i64) -> Self {
        Self {
            sub: user_id.to_string(),
            exp,
        }
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// Account whose email a verification token confirms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailOwner {
    pub id: i64,
    pub email: String,
}

/// Claims of the single-use email verification token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerificationClaims {
    pub sub: String,
    pub email: String,
    pub exp: i64,
}

impl VerificationClaims {
    pub fn subject_id(&self) -> Result<i64, TokenError> {
        parse_subject(&self.sub)
    }
}

impl TokenClaims for VerificationClaims {
    type Subject = EmailOwner;

    fn from_subject(owner: EmailOwner, exp: i64) -> Self {
        Self {
            sub: owner.id.to_string(),
            email: owner.email,
            exp,
        }
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_claims_serialize_role_as_string() {
        let claims = AccessClaims::from_subject(
            Identity {
                id: 7,
                role: Role::Provider,
                verified: false,
            },
            1_700_000_000,
        );
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["sub"], "7");
        assert_eq!(json["role"], "PROVIDER");
        assert_eq!(json["verified"], false);
        assert_eq!(json["exp"], 1_700_000_000);
    }

    #[test]
    fn refresh_claims_carry_no_role() {
        let json = serde_json::to_value(RefreshClaims::from_subject(3, 10)).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 2);
        assert!(json.get("role").is_none());
    }

    #[test]
    fn claim_shapes_reject_each_other() {
        let access = serde_json::json!({"sub": "1", "role": "ADMIN", "verified": true, "exp": 10});
        let refresh = serde_json::json!({"sub": "1", "exp": 10});
        let verification = serde_json::json!({"sub": "1", "email": "a@example.com", "exp": 10});

        assert!(serde_json::from_value::<RefreshClaims>(access.clone()).is_err());
        assert!(serde_json::from_value::<RefreshClaims>(verification.clone()).is_err());
        assert!(serde_json::from_value::<VerificationClaims>(access).is_err());
        assert!(serde_json::from_value::<VerificationClaims>(refresh.clone()).is_err());
        assert!(serde_json::from_value::<AccessClaims>(verification).is_err());
        assert!(serde_json::from_value::<RefreshClaims>(refresh).is_ok());
    }

    #[test]
    fn non_numeric_subject_is_malformed() {
        let claims = RefreshClaims {
            sub: "abc".to_string(),
            exp: 0,
        };
        assert_eq!(claims.subject_id(), Err(TokenError::Malformed));
    }
}
