// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Account Storage
//!
//! Persistent storage for user accounts and the verification ledger, in a
//! single embedded redb file under `DATA_DIR`.
//!
//! ## Layout
//!
//! ```text
//! $DATA_DIR/
//!   accounts.redb   # users, email index, verification ledger, counters
//! ```
//!
//! Services depend on the [`UserRepository`] and [`VerificationLedger`]
//! traits; [`AccountDatabase`] implements both.

pub mod database;
pub mod ledger;
pub mod users;

pub use database::AccountDatabase;
pub use ledger::{ClaimOutcome, LedgerSweeper, VerificationLedger};
pub use users::{
    AccountStatus, ConfirmationDetails, Credentials, NewUser, PersonalId, PersonalInfoPatch,
    StoredUser, UserRepository,
};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("user not found")]
    NotFound,

    #[error("email already registered")]
    EmailTaken,

    #[error("no changes")]
    NoChanges,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
