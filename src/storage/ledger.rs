// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Verification Ledger
//!
//! One-time-use record of consumed email verification tokens.
//!
//! `claim` is an atomic check-then-mark: of any number of concurrent claims
//! for the same token value exactly one observes [`ClaimOutcome::Claimed`].
//! Entries carry an expiry and are free to be reclaimed afterwards, by which
//! time the token itself no longer authenticates.
//!
//! Keys are digests of the token value, so bearer credentials are never
//! persisted.
//!
//! ## Garbage collection
//!
//! [`LedgerSweeper`] periodically deletes expired entries. It stops on a
//! `tokio_util::sync::CancellationToken`.

use std::sync::Arc;
use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::StorageResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    AlreadyClaimed,
}

pub trait VerificationLedger: Send + Sync {
    /// Atomically mark `token` consumed until `expires_at` (unix seconds).
    fn claim(&self, token: &str, expires_at: i64) -> StorageResult<ClaimOutcome>;

    /// Delete entries that expired at or before `now` (unix seconds).
    fn purge_expired(&self, now: i64) -> StorageResult<usize>;
}

/// Ledger key for a token value.
pub fn token_key(token: &str) -> String {
    Base64UrlUnpadded::encode_string(&Sha256::digest(token.as_bytes()))
}

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// Background task removing expired ledger entries.
pub struct LedgerSweeper {
    ledger: Arc<dyn VerificationLedger>,
    interval: Duration,
}

impl LedgerSweeper {
    pub fn new(ledger: Arc<dyn VerificationLedger>, interval: Duration) -> Self {
        Self { ledger, interval }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Verification ledger sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Verification ledger sweeper shutting down");
                    return;
                }
            }

            self.sweep();
        }
    }

    /// One pass; returns how many entries were removed.
    pub fn sweep(&self) -> usize {
        match self.ledger.purge_expired(Utc::now().timestamp()) {
            Ok(0) => 0,
            Ok(removed) => {
                debug!(removed, "Purged expired verification ledger entries");
                removed
            }
            Err(e) => {
                warn!(error = %e, "Verification ledger sweep failed");
                0
            }
        }
    }
}
