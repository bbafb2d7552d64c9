// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Self-issued HS256 JWTs and role-based access control.
//!
//! ## Token Model
//!
//! - access token: short-lived, carries id, role and verification status
//! - refresh token: long-lived, carries only the id
//! - verification token: single use, proves control of an email address
//!
//! Access and refresh tokens are delivered as `HttpOnly` cookies and
//! presented back as `Authorization: Bearer <token>`.
//!
//! ## Request Pipeline
//!
//! 1. [`middleware::authenticate`] verifies the bearer token and stores a
//!    [`RequestIdentity`] in the request extensions
//! 2. [`rbac`] policies check role, verification status and ownership
//! 3. handlers read the caller through [`CurrentUser`] / [`TargetUser`]
//!
//! ## Security
//!
//! - Each token kind has its own secret
//! - No clock skew tolerance on expiry
//! - Access tokens are not revocable; role changes apply on the next refresh

pub mod claims;
pub mod context;
pub mod error;
pub mod flow;
pub mod middleware;
pub mod password;
pub mod rbac;
pub mod roles;
pub mod token;

pub use claims::{AccessClaims, EmailOwner, Identity, RefreshClaims, VerificationClaims};
pub use context::{CurrentUser, RefreshSubject, RequestIdentity, TargetUser};
pub use error::AuthError;
pub use flow::{AuthFlow, LoginTokens};
pub use password::{Argon2Params, Argon2Passwords, PasswordError, PasswordVerifier};
pub use rbac::{OwnershipPolicy, RolePolicy, VerificationGate};
pub use roles::Role;
pub use token::{AccessTokens, RefreshTokens, TokenError, TokenManager, VerificationTokens};
