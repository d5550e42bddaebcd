//! Record store abstraction.
//!
//! The OTP flow keeps its state in a document store keyed by
//! `collection + id`. Records are semi-structured JSON objects; every write
//! stamps the record with a fresh `version` from a store-wide increasing
//! sequence, so callers can apply read-modify-write sequences as
//! compare-and-swap updates. Versions are never reused, not even when a
//! deleted record is created again.
//!
//! Two backends ship with the crate:
//! - [`PgStore`]: a single JSONB table in `PostgreSQL` (see `db/sql/01_records.sql`).
//! - [`MemoryStore`]: in-process map used for local development and tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use serde_json::{Map, Value};
use std::{future::Future, pin::Pin};

/// Pending registrations awaiting OTP verification.
pub const PENDING_REGISTRATIONS: &str = "tempUsers";
/// Live OTP challenges, one per subject.
pub const OTP_CHALLENGES: &str = "otp_verifications";
/// Verified, permanent user accounts.
pub const USERS: &str = "users";

/// Field map of a single record.
pub type Fields = Map<String, Value>;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    #[error("version conflict on {collection}/{id}")]
    Conflict { collection: String, id: String },
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn conflict(collection: &str, id: &str) -> Self {
        Self::Conflict {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// A record together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub fields: Fields,
    pub version: i64,
}

/// How `set` treats an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Replace the record with the given fields.
    Overwrite,
    /// Shallow-merge the given fields into the record, keeping the others.
    Merge,
}

/// Read/write contract the OTP flow relies on.
///
/// `expected_version` turns `update`/`delete` into a compare-and-swap: the
/// write only applies when the stored version still matches, otherwise
/// [`StoreError::Conflict`] is returned and nothing changes.
pub trait RecordStore: Send + Sync {
    fn get<'a>(&'a self, collection: &'a str, id: &'a str) -> StoreFuture<'a, Option<Record>>;

    /// Create or replace/merge a record. Returns the new version.
    fn set<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Fields,
        mode: SetMode,
    ) -> StoreFuture<'a, i64>;

    /// Merge fields into an existing record. Returns the new version.
    ///
    /// Fails with [`StoreError::NotFound`] when the record does not exist.
    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Fields,
        expected_version: Option<i64>,
    ) -> StoreFuture<'a, i64>;

    /// Delete a record. Returns whether a record was removed.
    fn delete<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        expected_version: Option<i64>,
    ) -> StoreFuture<'a, bool>;

    /// Cheap connectivity check for `/health`.
    fn ping(&self) -> StoreFuture<'_, ()>;
}

/// Shallow merge `incoming` into `base`, the way document stores apply
/// `{merge: true}` writes.
pub(crate) fn merge_fields(base: &mut Fields, incoming: Fields) {
    for (key, value) in incoming {
        base.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_fields_keeps_untouched_keys() {
        let mut base = Fields::new();
        base.insert("otp".to_string(), json!("111111"));
        base.insert("attemptsResend".to_string(), json!(2));

        let mut incoming = Fields::new();
        incoming.insert("otp".to_string(), json!("222222"));
        incoming.insert("attempts".to_string(), json!(0));

        merge_fields(&mut base, incoming);

        assert_eq!(base.get("otp"), Some(&json!("222222")));
        assert_eq!(base.get("attemptsResend"), Some(&json!(2)));
        assert_eq!(base.get("attempts"), Some(&json!(0)));
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::conflict(OTP_CHALLENGES, "abc");
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "version conflict on otp_verifications/abc");
    }
}
