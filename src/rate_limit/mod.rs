// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Token-bucket rate limiting for chat requests
//!
//! Buckets are keyed per guest and client IP and live in the shared
//! [`UsageStore`], so every proxy instance enforces the same limit. The
//! limiter fails open: when the store is unreachable the request is admitted
//! and the failure is logged.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::storage::UsageStore;

/// Bucket shape: `capacity` tokens, refilled in full over `refill_period`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucketConfig {
    pub capacity: u32,
    pub refill_period: Duration,
}

impl TokenBucketConfig {
    /// `limit` requests per minute
    pub fn per_minute(limit: u32) -> Self {
        Self {
            capacity: limit,
            refill_period: Duration::from_secs(60),
        }
    }

    /// Tokens added per second
    pub fn refill_rate(&self) -> f64 {
        let secs = self.refill_period.as_secs_f64();
        if secs <= 0.0 {
            return self.capacity as f64;
        }
        self.capacity as f64 / secs
    }
}

/// Outcome of a single admission attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketDecision {
    pub allowed: bool,
    /// Whole tokens left after this attempt
    pub remaining: u32,
    /// Seconds until one token is available; 0 when admitted
    pub retry_after_secs: u64,
    pub limit: u32,
}

/// Rate-limit block reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
}

impl From<BucketDecision> for RateLimitInfo {
    fn from(decision: BucketDecision) -> Self {
        Self {
            limit: decision.limit,
            remaining: decision.remaining,
        }
    }
}

/// Stored tokens plus refill, clamped to `[0, capacity]`
pub fn refill(tokens: f64, elapsed_secs: f64, refill_rate: f64, capacity: u32) -> f64 {
    let refilled = tokens + elapsed_secs.max(0.0) * refill_rate;
    refilled.min(capacity as f64).max(0.0)
}

/// Whole seconds until the bucket holds one token
pub fn retry_after_secs(tokens: f64, refill_rate: f64) -> u64 {
    if tokens >= 1.0 {
        return 0;
    }
    if refill_rate <= 0.0 {
        return 60;
    }
    ((1.0 - tokens) / refill_rate).max(0.0).ceil() as u64
}

/// Shared-store token bucket
#[derive(Clone)]
pub struct TokenBucketLimiter {
    store: Arc<dyn UsageStore>,
    config: TokenBucketConfig,
}

impl TokenBucketLimiter {
    pub fn new(store: Arc<dyn UsageStore>, config: TokenBucketConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> TokenBucketConfig {
        self.config
    }

    /// Refill the bucket for `key` and try to consume one token.
    ///
    /// Never fails: a store error admits the request with a full bucket.
    pub async fn admit(&self, key: &str) -> BucketDecision {
        let rate = self.config.refill_rate();
        let limit = self.config.capacity;

        match self.store.admit(key, limit, rate).await {
            Ok(state) => {
                let remaining = state.tokens.max(0.0).floor() as u32;
                let retry_after = if state.allowed {
                    0
                } else {
                    retry_after_secs(state.tokens, rate)
                };
                if !state.allowed {
                    warn!("Rate limit exceeded for {} (retry in {}s)", key, retry_after);
                }
                BucketDecision {
                    allowed: state.allowed,
                    remaining: remaining.min(limit),
                    retry_after_secs: retry_after,
                    limit,
                }
            }
            Err(e) => {
                error!("Rate limiter store unavailable, admitting {}: {}", key, e);
                BucketDecision {
                    allowed: true,
                    remaining: limit,
                    retry_after_secs: 0,
                    limit,
                }
            }
        }
    }

    /// Whole tokens available for `key` without consuming any
    pub async fn remaining(&self, key: &str) -> u32 {
        let limit = self.config.capacity;
        match self.store.peek_bucket(key).await {
            Ok(Some(snapshot)) => {
                let tokens = refill(
                    snapshot.tokens,
                    snapshot.elapsed_secs,
                    self.config.refill_rate(),
                    limit,
                );
                (tokens.floor() as u32).min(limit)
            }
            Ok(None) => limit,
            Err(e) => {
                warn!("Could not read rate bucket {}: {}", key, e);
                limit
            }
        }
    }
}
