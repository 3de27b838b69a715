// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Persistent counters for rate limiting, guest quotas and uploaded vaults
//!
//! Every mutating operation is a single atomic step against the backing
//! store, so concurrent requests for the same key can never both observe and
//! consume the same token or quota slot. Callers decide how to react when the
//! store is unreachable; this module only reports the failure.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use memory::MemoryUsageStore;
pub use postgres::PgUsageStore;

/// Bucket state right after an admission attempt
#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct BucketState {
    /// Tokens left after refilling and (if admitted) consuming one
    pub tokens: f64,
    /// Whether a token was consumed
    pub allowed: bool,
}

/// Stored bucket state, read without refilling or consuming
#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct BucketSnapshot {
    pub tokens: f64,
    /// Seconds since the last recorded refill
    pub elapsed_secs: f64,
}

/// Guest quota row
#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct QuotaRow {
    pub requests_made: i64,
    /// Seconds since `first_request_at`
    pub elapsed_secs: f64,
}

/// Errors raised by a [`UsageStore`]
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("value out of range for storage: {0}")]
    InvalidValue(String),
}

/// Typed operations over the shared persistent store
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Refill the bucket for `key` and try to consume one token.
    ///
    /// A missing bucket is created full before consuming. Refill adds
    /// `elapsed_seconds * refill_rate` tokens, clamped to `capacity`.
    async fn admit(
        &self,
        key: &str,
        capacity: u32,
        refill_rate: f64,
    ) -> Result<BucketState, StorageError>;

    /// Read a bucket without touching it
    async fn peek_bucket(&self, key: &str) -> Result<Option<BucketSnapshot>, StorageError>;

    /// Increment the lifetime request counter for a guest
    async fn record_count(&self, guest_id: &str) -> Result<QuotaRow, StorageError>;

    /// Increment the counter for a guest, restarting it at 1 once `window`
    /// has elapsed since the first request of the current window
    async fn record_window(
        &self,
        guest_id: &str,
        window: Duration,
    ) -> Result<QuotaRow, StorageError>;

    /// Read a guest's quota row without touching it
    async fn read_quota(&self, guest_id: &str) -> Result<Option<QuotaRow>, StorageError>;

    /// Replace the stored vault content for a guest
    async fn store_vault(&self, guest_id: &str, content: &str) -> Result<(), StorageError>;

    /// Fetch the stored vault content for a guest
    async fn load_vault(&self, guest_id: &str) -> Result<Option<String>, StorageError>;

    /// Cheap reachability check
    async fn ping(&self) -> Result<(), StorageError>;

    /// Backend name for health reporting and logs
    fn backend(&self) -> &'static str;
}
