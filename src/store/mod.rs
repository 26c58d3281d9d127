//! Blip persistence into the shared buffer schema.
//!
//! This module provides:
//! - Transactional, idempotent writes (one transaction per raw event)
//! - Transient-error retry with bounded exponential backoff
//! - An error taxonomy that keeps foreign-key skips, retriable failures and
//!   reconciliation-worthy exhaustion distinct

pub mod error;
pub mod retry;
pub mod writer;

pub use error::{classify_sqlstate, StoreError, StoreErrorKind};
pub use retry::{retry_with_backoff, RetryConfig, RetryResult};
pub use writer::{insert_statement, BlipWriter, CommitOutcome};
