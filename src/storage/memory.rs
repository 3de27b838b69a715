// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-local [`UsageStore`]
//!
//! Used when no database is configured and as the store behind the test
//! suites. Counters live only as long as the process, so this backend is
//! only correct for a single server instance.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{BucketSnapshot, BucketState, QuotaRow, StorageError, UsageStore};
use crate::rate_limit::refill;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug, Clone, Copy)]
struct GuestUsage {
    requests_made: i64,
    first_request_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    buckets: HashMap<String, Bucket>,
    guests: HashMap<String, GuestUsage>,
    vaults: HashMap<String, String>,
}

/// In-memory usage store with optional fault injection
#[derive(Debug, Default)]
pub struct MemoryUsageStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail as if the database were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of buckets created so far
    pub fn bucket_count(&self) -> usize {
        self.state.lock().map(|s| s.buckets.len()).unwrap_or(0)
    }

    /// Number of guest quota rows created so far
    pub fn guest_count(&self) -> usize {
        self.state.lock().map(|s| s.guests.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        self.state
            .lock()
            .map_err(|_| StorageError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

fn quota_row(usage: &GuestUsage, now: Instant) -> QuotaRow {
    QuotaRow {
        requests_made: usage.requests_made,
        elapsed_secs: now.duration_since(usage.first_request_at).as_secs_f64(),
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn admit(
        &self,
        key: &str,
        capacity: u32,
        refill_rate: f64,
    ) -> Result<BucketState, StorageError> {
        let mut state = self.lock()?;
        let now = Instant::now();

        let bucket = state.buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: capacity as f64,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        let mut tokens = refill(bucket.tokens, elapsed, refill_rate, capacity);
        let allowed = tokens >= 1.0;
        if allowed {
            tokens -= 1.0;
        }

        bucket.tokens = tokens;
        bucket.last_refill = now;

        Ok(BucketState { tokens, allowed })
    }

    async fn peek_bucket(&self, key: &str) -> Result<Option<BucketSnapshot>, StorageError> {
        let state = self.lock()?;
        let now = Instant::now();
        Ok(state.buckets.get(key).map(|b| BucketSnapshot {
            tokens: b.tokens,
            elapsed_secs: now.duration_since(b.last_refill).as_secs_f64(),
        }))
    }

    async fn record_count(&self, guest_id: &str) -> Result<QuotaRow, StorageError> {
        let mut state = self.lock()?;
        let now = Instant::now();

        let usage = state
            .guests
            .entry(guest_id.to_string())
            .and_modify(|u| u.requests_made += 1)
            .or_insert(GuestUsage {
                requests_made: 1,
                first_request_at: now,
            });

        Ok(quota_row(usage, now))
    }

    async fn record_window(
        &self,
        guest_id: &str,
        window: Duration,
    ) -> Result<QuotaRow, StorageError> {
        let mut state = self.lock()?;
        let now = Instant::now();

        let usage = state
            .guests
            .entry(guest_id.to_string())
            .and_modify(|u| {
                if now.duration_since(u.first_request_at) <= window {
                    u.requests_made += 1;
                } else {
                    u.requests_made = 1;
                    u.first_request_at = now;
                }
            })
            .or_insert(GuestUsage {
                requests_made: 1,
                first_request_at: now,
            });

        Ok(quota_row(usage, now))
    }

    async fn read_quota(&self, guest_id: &str) -> Result<Option<QuotaRow>, StorageError> {
        let state = self.lock()?;
        let now = Instant::now();
        Ok(state.guests.get(guest_id).map(|u| quota_row(u, now)))
    }

    async fn store_vault(&self, guest_id: &str, content: &str) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state
            .vaults
            .insert(guest_id.to_string(), content.to_string());
        Ok(())
    }

    async fn load_vault(&self, guest_id: &str) -> Result<Option<String>, StorageError> {
        let state = self.lock()?;
        Ok(state.vaults.get(guest_id).cloned())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.lock().map(|_| ())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
