// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Accounts - User Account & Authentication Service
//!
//! Registration, login and email verification for a user account service,
//! with stateless JWT access/refresh tokens and role-based access control.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers and router (Axum)
//! - `auth` - Tokens, authentication middleware, RBAC policies, auth flows
//! - `config` - Environment configuration
//! - `mailer` - Confirmation and notification letters
//! - `storage` - Embedded user store and verification ledger (redb)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod mailer;
pub mod models;
pub mod state;
pub mod storage;
