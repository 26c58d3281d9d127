//! Storage error types.
//!
//! This module defines error types that distinguish between transient and
//! permanent storage failures. The distinction is critical for retry logic:
//!
//! - **Transient** errors are retriable (connection loss, pool timeouts,
//!   deadlocks, serialization failures)
//! - **Permanent** errors are not (constraint violations other than the
//!   idempotency key, schema mismatches, type errors)
//!
//! Special case:
//! - **Foreign-key violations** mean the blip references a base or server the
//!   static data tables do not know yet. The blip set is skipped quietly;
//!   retrying would fail the same way until the static data is updated.

use std::fmt;
use thiserror::Error;

/// The kind of storage error, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Transient error - safe to retry with backoff.
    Transient,

    /// Permanent error - retrying cannot help.
    Permanent,

    /// A foreign-key violation (Postgres class 23503): the referenced static
    /// data row does not exist. The blip set is dropped, not retried.
    ForeignKey,

    /// A transient error that survived the full retry budget. Surfaced to the
    /// caller, which must durably log the blip set for reconciliation.
    Exhausted,
}

impl StoreErrorKind {
    /// Returns true if this error is retriable.
    pub fn is_retriable(&self) -> bool {
        matches!(self, StoreErrorKind::Transient)
    }
}

/// A storage error with categorization for retry decisions.
#[derive(Debug, Error)]
pub struct StoreError {
    /// The kind of error.
    pub kind: StoreErrorKind,

    /// A human-readable description of the error.
    pub message: String,

    /// The underlying sqlx error, if available.
    #[source]
    pub source: Option<sqlx::Error>,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "storage error: {}", self.message)
    }
}

impl StoreError {
    /// Creates a transient error without an sqlx source.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::Transient,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a permanent error without an sqlx source.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::Permanent,
            message: message.into(),
            source: None,
        }
    }

    /// Wraps the last error of an exhausted retry sequence.
    pub fn exhausted(last: StoreError, attempts: u32) -> Self {
        Self {
            kind: StoreErrorKind::Exhausted,
            message: format!("{} (gave up after {attempts} attempts)", last.message),
            source: last.source,
        }
    }

    /// Categorizes an sqlx error.
    ///
    /// Connection-level failures and pool exhaustion are transient; database
    /// errors are categorized by their SQLSTATE code; everything else is
    /// permanent.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreErrorKind::Transient,
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(code) => classify_sqlstate(code),
                None => StoreErrorKind::Permanent,
            },
            _ => StoreErrorKind::Permanent,
        };
        Self {
            kind,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

/// Maps a Postgres SQLSTATE code to an error kind.
///
/// - `40001` (serialization failure) and `40P01` (deadlock detected) resolve
///   on retry
/// - `23503` (foreign_key_violation) is the skip-quietly case
/// - class `08` (connection exceptions) is transient
/// - `57P03` (cannot_connect_now) shows up during server restarts
pub fn classify_sqlstate(code: &str) -> StoreErrorKind {
    match code {
        "40001" | "40P01" | "57P03" => StoreErrorKind::Transient,
        "23503" => StoreErrorKind::ForeignKey,
        _ if code.starts_with("08") => StoreErrorKind::Transient,
        _ => StoreErrorKind::Permanent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstate_classification() {
        assert_eq!(classify_sqlstate("40001"), StoreErrorKind::Transient);
        assert_eq!(classify_sqlstate("40P01"), StoreErrorKind::Transient);
        assert_eq!(classify_sqlstate("57P03"), StoreErrorKind::Transient);
        assert_eq!(classify_sqlstate("08006"), StoreErrorKind::Transient);
        assert_eq!(classify_sqlstate("23503"), StoreErrorKind::ForeignKey);
        assert_eq!(classify_sqlstate("23505"), StoreErrorKind::Permanent);
        assert_eq!(classify_sqlstate("42P01"), StoreErrorKind::Permanent);
    }

    #[test]
    fn pool_errors_are_transient() {
        let err = StoreError::from_sqlx(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind, StoreErrorKind::Transient);
        assert!(err.kind.is_retriable());
    }

    #[test]
    fn row_not_found_is_permanent() {
        let err = StoreError::from_sqlx(sqlx::Error::RowNotFound);
        assert_eq!(err.kind, StoreErrorKind::Permanent);
        assert!(!err.kind.is_retriable());
    }

    #[test]
    fn exhausted_keeps_the_last_message() {
        let last = StoreError::transient("connection reset by peer");
        let err = StoreError::exhausted(last, 6);
        assert_eq!(err.kind, StoreErrorKind::Exhausted);
        assert!(err.message.contains("connection reset by peer"));
        assert!(err.message.contains("6 attempts"));
    }

    #[test]
    fn only_transient_is_retriable() {
        assert!(StoreErrorKind::Transient.is_retriable());
        assert!(!StoreErrorKind::Permanent.is_retriable());
        assert!(!StoreErrorKind::ForeignKey.is_retriable());
        assert!(!StoreErrorKind::Exhausted.is_retriable());
    }
}
