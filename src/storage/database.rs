// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded account database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user id → serialized StoredUser
//! - `user_email_index`: lowercase email → user id
//! - `verification_ledger`: token digest → expiry (unix seconds)
//! - `meta`: key → counter (`next_user_id`)
//!
//! redb runs one write transaction at a time, so every read-check-write
//! sequence below is atomic.

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::ledger::{token_key, ClaimOutcome, VerificationLedger};
use super::users::{
    AccountStatus, ConfirmationDetails, Credentials, NewUser, PersonalInfoPatch, StoredUser,
    UserRepository,
};
use super::{StorageError, StorageResult};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: user id → serialized StoredUser (JSON bytes).
const USERS: TableDefinition<i64, &[u8]> = TableDefinition::new("users");

/// Unique index: lowercase email → user id.
const USER_EMAIL_INDEX: TableDefinition<&str, i64> = TableDefinition::new("user_email_index");

/// Consumed verification tokens: base64url(sha256(token)) → expiry.
const VERIFICATION_LEDGER: TableDefinition<&str, i64> = TableDefinition::new("verification_ledger");

/// Counters.
const META: TableDefinition<&str, i64> = TableDefinition::new("meta");

const NEXT_USER_ID: &str = "next_user_id";

/// File name inside the data directory.
pub const DATABASE_FILE: &str = "accounts.redb";

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn decode_user(bytes: &[u8]) -> StorageResult<StoredUser> {
    Ok(serde_json::from_slice(bytes)?)
}

// =============================================================================
// AccountDatabase
// =============================================================================

pub struct AccountDatabase {
    db: Database,
}

impl AccountDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_EMAIL_INDEX)?;
            let _ = write_txn.open_table(VERIFICATION_LEDGER)?;
            let _ = write_txn.open_table(META)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Open `DATABASE_FILE` inside `data_dir`.
    pub fn open_in(data_dir: &Path) -> StorageResult<Self> {
        Self::open(&data_dir.join(DATABASE_FILE))
    }

    /// Cheap readiness probe.
    pub fn ping(&self) -> StorageResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(META)?;
        Ok(())
    }

    fn user_by_email(&self, email: &str) -> StorageResult<StoredUser> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(USER_EMAIL_INDEX)?;
        let id = index
            .get(normalize_email(email).as_str())?
            .map(|v| v.value())
            .ok_or(StorageError::NotFound)?;

        let users = read_txn.open_table(USERS)?;
        let row = users.get(id)?.ok_or(StorageError::NotFound)?;
        decode_user(row.value())
    }

    /// Read-modify-write of one user row.
    fn modify_user(
        &self,
        id: i64,
        change: impl FnOnce(&mut StoredUser),
    ) -> StorageResult<StoredUser> {
        let write_txn = self.db.begin_write()?;
        let user = {
            let mut users = write_txn.open_table(USERS)?;
            let mut user = {
                let row = users.get(id)?.ok_or(StorageError::NotFound)?;
                decode_user(row.value())?
            };
            change(&mut user);
            users.insert(id, serde_json::to_vec(&user)?.as_slice())?;
            user
        };
        write_txn.commit()?;
        Ok(user)
    }
}

impl UserRepository for AccountDatabase {
    fn create(&self, new: NewUser) -> StorageResult<StoredUser> {
        let email = normalize_email(&new.email);

        let write_txn = self.db.begin_write()?;
        let user = {
            let mut index = write_txn.open_table(USER_EMAIL_INDEX)?;
            if index.get(email.as_str())?.is_some() {
                return Err(StorageError::EmailTaken);
            }

            let mut meta = write_txn.open_table(META)?;
            let id = meta.get(NEXT_USER_ID)?.map(|v| v.value()).unwrap_or(1);
            meta.insert(NEXT_USER_ID, id + 1)?;

            let (personal_id_preview, personal_id_digest) = match new.personal_id {
                Some(pid) => (Some(pid.preview), Some(pid.digest)),
                None => (None, None),
            };
            let user = StoredUser {
                id,
                first_name: new.first_name,
                last_name: new.last_name,
                phone_number: new.phone_number,
                email: email.clone(),
                password_hash: new.password_hash,
                role: new.role,
                verified: false,
                personal_id_preview,
                personal_id_digest,
                created_at: Utc::now(),
            };

            let mut users = write_txn.open_table(USERS)?;
            users.insert(id, serde_json::to_vec(&user)?.as_slice())?;
            index.insert(email.as_str(), id)?;
            user
        };
        write_txn.commit()?;
        Ok(user)
    }

    fn find_credentials(&self, email: &str) -> StorageResult<Credentials> {
        let user = self.user_by_email(email)?;
        Ok(Credentials {
            id: user.id,
            password_hash: user.password_hash,
            role: user.role,
            verified: user.verified,
        })
    }

    fn find_role_and_verification(&self, id: i64) -> StorageResult<AccountStatus> {
        let user = self.get(id)?;
        Ok(AccountStatus {
            role: user.role,
            verified: user.verified,
        })
    }

    fn find_confirmation_details(&self, email: &str) -> StorageResult<ConfirmationDetails> {
        let user = self.user_by_email(email)?;
        Ok(ConfirmationDetails {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            verified: user.verified,
        })
    }

    fn get(&self, id: i64) -> StorageResult<StoredUser> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        let row = users.get(id)?.ok_or(StorageError::NotFound)?;
        decode_user(row.value())
    }

    fn list(&self) -> StorageResult<Vec<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        let mut out = Vec::new();
        for entry in users.iter()? {
            let (_, row) = entry?;
            out.push(decode_user(row.value())?);
        }
        Ok(out)
    }

    fn update_personal_info(&self, id: i64, mut patch: PersonalInfoPatch) -> StorageResult<StoredUser> {
        if patch.is_empty() {
            return Err(StorageError::NoChanges);
        }
        patch.email = patch.email.as_deref().map(normalize_email);

        let write_txn = self.db.begin_write()?;
        let user = {
            let mut users = write_txn.open_table(USERS)?;
            let mut user = {
                let row = users.get(id)?.ok_or(StorageError::NotFound)?;
                decode_user(row.value())?
            };

            if let Some(new_email) = patch.email.as_deref().filter(|e| *e != user.email) {
                let mut index = write_txn.open_table(USER_EMAIL_INDEX)?;
                if index.get(new_email)?.is_some() {
                    return Err(StorageError::EmailTaken);
                }
                index.remove(user.email.as_str())?;
                index.insert(new_email, id)?;
            }

            patch.apply(&mut user);
            users.insert(id, serde_json::to_vec(&user)?.as_slice())?;
            user
        };
        write_txn.commit()?;
        Ok(user)
    }

    fn update_password_hash(&self, id: i64, password_hash: &str) -> StorageResult<()> {
        self.modify_user(id, |user| user.password_hash = password_hash.to_string())
            .map(|_| ())
    }

    fn mark_verified(&self, id: i64) -> StorageResult<()> {
        self.modify_user(id, |user| user.verified = true).map(|_| ())
    }

    fn delete(&self, id: i64) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;
            let user = match users.remove(id)? {
                Some(row) => decode_user(row.value())?,
                None => return Err(StorageError::NotFound),
            };
            let mut index = write_txn.open_table(USER_EMAIL_INDEX)?;
            index.remove(user.email.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl VerificationLedger for AccountDatabase {
    fn claim(&self, token: &str, expires_at: i64) -> StorageResult<ClaimOutcome> {
        let key = token_key(token);
        let now = Utc::now().timestamp();

        let write_txn = self.db.begin_write()?;
        {
            let mut ledger = write_txn.open_table(VERIFICATION_LEDGER)?;
            let live = ledger
                .get(key.as_str())?
                .is_some_and(|expires_at| expires_at.value() > now);
            if live {
                return Ok(ClaimOutcome::AlreadyClaimed);
            }
            ledger.insert(key.as_str(), expires_at.max(now + 1))?;
        }
        write_txn.commit()?;
        Ok(ClaimOutcome::Claimed)
    }

    fn purge_expired(&self, now: i64) -> StorageResult<usize> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut ledger = write_txn.open_table(VERIFICATION_LEDGER)?;
            let mut expired = Vec::new();
            for entry in ledger.iter()? {
                let (key, expires_at) = entry?;
                if expires_at.value() <= now {
                    expired.push(key.value().to_string());
                }
            }
            for key in &expired {
                ledger.remove(key.as_str())?;
            }
            expired.len()
        };
        write_txn.commit()?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::storage::users::PersonalId;
    use std::sync::{Arc, Barrier};
    use tempfile::TempDir;

    fn open_db() -> (AccountDatabase, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = AccountDatabase::open_in(dir.path()).unwrap();
        (db, dir)
    }

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            first_name: "Nino".to_string(),
            last_name: "Beridze".to_string(),
            phone_number: "995555123456".to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role,
            personal_id: None,
        }
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let (db, _dir) = open_db();
        let first = db.create(new_user("a@example.com", Role::Admin)).unwrap();
        let second = db.create(new_user("b@example.com", Role::Customer)).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(!first.verified);
    }

    #[test]
    fn email_is_unique_case_insensitively() {
        let (db, _dir) = open_db();
        db.create(new_user("Ann@Example.com", Role::Customer)).unwrap();
        let err = db
            .create(new_user("ann@example.com", Role::Customer))
            .unwrap_err();
        assert!(matches!(err, StorageError::EmailTaken));

        let creds = db.find_credentials("ANN@example.com").unwrap();
        assert_eq!(creds.id, 1);
        assert_eq!(creds.role, Role::Customer);
    }

    #[test]
    fn provider_keeps_only_preview_and_digest() {
        let (db, _dir) = open_db();
        let mut user = new_user("p@example.com", Role::Provider);
        user.personal_id = Some(PersonalId {
            preview: "56789".to_string(),
            digest: "digest".to_string(),
        });
        let stored = db.create(user).unwrap();
        let loaded = db.get(stored.id).unwrap();
        assert_eq!(loaded.personal_id_preview.as_deref(), Some("56789"));
        assert_eq!(loaded.personal_id_digest.as_deref(), Some("digest"));
    }

    #[test]
    fn mark_verified_and_status() {
        let (db, _dir) = open_db();
        let user = db.create(new_user("v@example.com", Role::Moderator)).unwrap();
        db.mark_verified(user.id).unwrap();
        let status = db.find_role_and_verification(user.id).unwrap();
        assert_eq!(
            status,
            AccountStatus {
                role: Role::Moderator,
                verified: true
            }
        );
        assert!(matches!(db.mark_verified(99), Err(StorageError::NotFound)));
    }

    #[test]
    fn update_personal_info_moves_email_index() {
        let (db, _dir) = open_db();
        let user = db.create(new_user("old@example.com", Role::Customer)).unwrap();
        db.create(new_user("taken@example.com", Role::Customer)).unwrap();

        let taken = db.update_personal_info(
            user.id,
            PersonalInfoPatch {
                email: Some("taken@example.com".to_string()),
                ..Default::default()
            },
        );
        assert!(matches!(taken, Err(StorageError::EmailTaken)));

        let updated = db
            .update_personal_info(
                user.id,
                PersonalInfoPatch {
                    email: Some("New@example.com".to_string()),
                    first_name: Some("Giorgi".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.email, "new@example.com");
        assert_eq!(updated.first_name, "Giorgi");
        assert!(matches!(
            db.find_credentials("old@example.com"),
            Err(StorageError::NotFound)
        ));
        assert_eq!(db.find_credentials("new@example.com").unwrap().id, user.id);

        assert!(matches!(
            db.update_personal_info(user.id, PersonalInfoPatch::default()),
            Err(StorageError::NoChanges)
        ));
    }

    #[test]
    fn delete_removes_row_and_index() {
        let (db, _dir) = open_db();
        let user = db.create(new_user("gone@example.com", Role::Customer)).unwrap();
        db.delete(user.id).unwrap();
        assert!(matches!(db.get(user.id), Err(StorageError::NotFound)));
        assert!(matches!(db.delete(user.id), Err(StorageError::NotFound)));
        // Email is free again
        db.create(new_user("gone@example.com", Role::Customer)).unwrap();
    }

    #[test]
    fn list_returns_users_in_id_order() {
        let (db, _dir) = open_db();
        for email in ["x@example.com", "y@example.com", "z@example.com"] {
            db.create(new_user(email, Role::Customer)).unwrap();
        }
        let ids: Vec<i64> = db.list().unwrap().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn claim_is_at_most_once() {
        let (db, _dir) = open_db();
        let expires_at = Utc::now().timestamp() + 3600;
        assert_eq!(db.claim("token-a", expires_at).unwrap(), ClaimOutcome::Claimed);
        assert_eq!(db.claim("token-a", expires_at).unwrap(), ClaimOutcome::AlreadyClaimed);
        assert_eq!(db.claim("token-b", expires_at).unwrap(), ClaimOutcome::Claimed);
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let (db, _dir) = open_db();
        let db = Arc::new(db);
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let db = db.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    db.claim("same-token", Utc::now().timestamp() + 3600).unwrap()
                })
            })
            .collect();

        let outcomes: Vec<ClaimOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = outcomes
            .iter()
            .filter(|o| **o == ClaimOutcome::Claimed)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn expired_entries_are_purged_and_reclaimable() {
        let (db, _dir) = open_db();
        let now = Utc::now().timestamp();
        db.claim("old", now + 1).unwrap();
        db.claim("fresh", now + 3600).unwrap();

        let later = now + 10;
        assert_eq!(db.purge_expired(later).unwrap(), 1);
        assert_eq!(db.purge_expired(later).unwrap(), 0);
        assert_eq!(
            db.claim("fresh", now + 3600).unwrap(),
            ClaimOutcome::AlreadyClaimed
        );
    }
}
