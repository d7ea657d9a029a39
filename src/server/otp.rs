//! # OTP Store
//!
//! Process-wide table of pending one-time passcodes, at most one per identity.
//!
//! Every operation takes the table lock once and finishes its whole
//! read-modify-write before releasing it, so an `issue` racing a
//! `verify_and_consume` on the same identity never observes a half-written
//! record. Nothing awaits while the lock is held.
//!
//! Expiry is lazy: an expired record is deleted the moment it is looked at.
//! [`OtpStore::purge_expired`] exists for the background reaper and only
//! bounds memory; it never changes what a caller observes.

use crate::debug;
use crate::server::crypto::generate_otp_code;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

pub const DEFAULT_OTP_TTL_SECS: i64 = 300;
pub const DEFAULT_OTP_MAX_ATTEMPTS: u32 = 5;

/// Why a verification attempt was rejected. Both outcomes are terminal for
/// the attempt; only `Expired` is terminal for the code itself.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OtpError {
    #[error("OTP expired")]
    Expired,
    /// Wrong code, or no pending code at all. Deliberately one variant.
    #[error("Invalid OTP")]
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub failed_attempts: u32,
}

impl OtpRecord {
    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        self.issued_at + ttl
    }

    /// Strictly past the TTL; a check at exactly `issued_at + ttl` still passes.
    pub fn is_expired_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.issued_at > ttl
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    pub ttl: Duration,
    /// Mismatches tolerated before the record is dropped. `None` = unlimited.
    pub max_attempts: Option<u32>,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        OtpPolicy {
            ttl: Duration::seconds(DEFAULT_OTP_TTL_SECS),
            max_attempts: Some(DEFAULT_OTP_MAX_ATTEMPTS),
        }
    }
}

type OtpTable = HashMap<String, OtpRecord>;

#[derive(Clone)]
pub struct OtpStore {
    records: Arc<Mutex<OtpTable>>,
    policy: OtpPolicy,
}

impl Default for OtpStore {
    fn default() -> Self {
        Self::new(OtpPolicy::default())
    }
}

impl OtpStore {
    pub fn new(policy: OtpPolicy) -> Self {
        OtpStore {
            records: Arc::new(Mutex::new(HashMap::new())),
            policy,
        }
    }

    pub fn policy(&self) -> OtpPolicy {
        self.policy
    }

    // No operation leaves the map half-updated, so a poisoned lock still
    // guards a consistent table.
    fn table(&self) -> MutexGuard<'_, OtpTable> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Issues a fresh code for `identity`, replacing any pending one.
    pub fn issue(&self, identity: &str) -> String {
        self.issue_at(identity, Utc::now())
    }

    pub fn issue_at(&self, identity: &str, now: DateTime<Utc>) -> String {
        let code = generate_otp_code();
        self.store_code(identity, code.clone(), now);
        code
    }

    fn store_code(&self, identity: &str, code: String, now: DateTime<Utc>) {
        let record = OtpRecord {
            code,
            issued_at: now,
            failed_attempts: 0,
        };
        self.table().insert(identity.to_string(), record);
    }

    /// Returns true (and deletes the record) only if a record exists and
    /// has outlived the TTL. Absence is not expiry.
    pub fn is_expired(&self, identity: &str) -> bool {
        self.is_expired_at(identity, Utc::now())
    }

    pub fn is_expired_at(&self, identity: &str, now: DateTime<Utc>) -> bool {
        let mut table = self.table();
        evict_if_expired(&mut table, identity, self.policy.ttl, now)
    }

    /// Checks `candidate` against the pending code for `identity` and, on a
    /// match, deletes the record. Expiry is checked first, under the same lock.
    pub fn verify_and_consume(&self, identity: &str, candidate: &str) -> Result<(), OtpError> {
        self.verify_and_consume_at(identity, candidate, Utc::now())
    }

    pub fn verify_and_consume_at(
        &self,
        identity: &str,
        candidate: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OtpError> {
        let mut table = self.table();

        if evict_if_expired(&mut table, identity, self.policy.ttl, now) {
            return Err(OtpError::Expired);
        }

        let Some(record) = table.get_mut(identity) else {
            return Err(OtpError::Invalid);
        };

        if record.code != candidate {
            record.failed_attempts += 1;
            if let Some(max) = self.policy.max_attempts {
                if record.failed_attempts >= max {
                    table.remove(identity);
                }
            }
            return Err(OtpError::Invalid);
        }

        table.remove(identity);
        Ok(())
    }

    /// Removes the pending record only if it still holds `code`.
    ///
    /// Used to take back a code whose delivery failed, without clobbering a
    /// newer code issued for the same identity in the meantime.
    pub fn revoke(&self, identity: &str, code: &str) -> bool {
        let mut table = self.table();
        match table.get(identity) {
            Some(record) if record.code == code => {
                table.remove(identity);
                true
            }
            _ => false,
        }
    }

    /// Drops every expired record, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.policy.ttl;
        let mut table = self.table();
        let before = table.len();
        table.retain(|_, record| !record.is_expired_at(ttl, now));
        before - table.len()
    }

    /// Number of records currently held, expired-but-unchecked included.
    pub fn pending(&self) -> usize {
        self.table().len()
    }
}

fn evict_if_expired(
    table: &mut OtpTable,
    identity: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> bool {
    let expired = table
        .get(identity)
        .is_some_and(|record| record.is_expired_at(ttl, now));
    if expired {
        table.remove(identity);
        debug!("OTP for {} expired and was removed", identity);
    }
    expired
}
