// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Read-only usage view for a guest
//!
//! Reports remaining rate-limit tokens and quota state without consuming
//! either, and never fails: storage problems degrade to defaults.

use serde::Serialize;

use crate::quota::{QuotaLedger, QuotaStatus};
use crate::rate_limit::{RateLimitInfo, TokenBucketLimiter};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub rate_limit: RateLimitInfo,
    pub quota: QuotaStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Clone)]
pub struct UsageReporter {
    limiter: TokenBucketLimiter,
    ledger: QuotaLedger,
}

impl UsageReporter {
    pub fn new(limiter: TokenBucketLimiter, ledger: QuotaLedger) -> Self {
        Self { limiter, ledger }
    }

    pub async fn report(&self, guest_id: &str, bucket_key: &str) -> UsageReport {
        let remaining = self.limiter.remaining(bucket_key).await;
        let (quota, warning) = self.ledger.snapshot(guest_id).await;

        UsageReport {
            rate_limit: RateLimitInfo {
                limit: self.limiter.config().capacity,
                remaining,
            },
            quota,
            warning,
        }
    }
}
