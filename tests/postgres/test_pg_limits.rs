// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bucket and quota statements executed against Postgres

use std::sync::Arc;
use std::time::Duration;
use vault_chat_proxy::config::QuotaMode;
use vault_chat_proxy::quota::{QuotaLedger, QuotaUsage};
use vault_chat_proxy::rate_limit::{TokenBucketConfig, TokenBucketLimiter};
use vault_chat_proxy::storage::UsageStore;

use super::support::PgFixture;

#[tokio::test]
async fn test_bucket_capacity_then_rejection() {
    let Some(fixture) = PgFixture::create().await else {
        return;
    };
    let store: Arc<dyn UsageStore> = Arc::new(fixture.store().await);
    let limiter = TokenBucketLimiter::new(
        store,
        TokenBucketConfig {
            capacity: 3,
            refill_period: Duration::from_secs(3600),
        },
    );

    for expected in [2, 1, 0] {
        let decision = limiter.admit("g:pg:ip:1").await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, expected);
    }

    let rejected = limiter.admit("g:pg:ip:1").await;
    assert!(!rejected.allowed, "Fourth request should be rejected");
    assert!(rejected.retry_after_secs > 0);
    assert_eq!(limiter.remaining("g:pg:ip:1").await, 0);

    fixture.cleanup().await;
}

#[tokio::test]
async fn test_concurrent_admits_never_overspend() {
    let Some(fixture) = PgFixture::create().await else {
        return;
    };
    let store: Arc<dyn UsageStore> = Arc::new(fixture.store().await);
    let limiter = TokenBucketLimiter::new(
        store,
        TokenBucketConfig {
            capacity: 5,
            refill_period: Duration::from_secs(3600),
        },
    );

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.admit("shared").await.allowed })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 5);

    fixture.cleanup().await;
}

#[tokio::test]
async fn test_count_quota_boundary() {
    let Some(fixture) = PgFixture::create().await else {
        return;
    };
    let store: Arc<dyn UsageStore> = Arc::new(fixture.store().await);
    let ledger = QuotaLedger::new(store, QuotaMode::Count { total: 3 });

    for _ in 0..3 {
        assert!(ledger.record_and_check("guest").await.unwrap().allowed);
    }
    let outcome = ledger.record_and_check("guest").await.unwrap();
    assert!(!outcome.allowed, "Fourth request should exceed the quota");
    assert_eq!(outcome.status.used(), 4);

    fixture.cleanup().await;
}

#[tokio::test]
async fn test_window_quota_resets_after_expiry() {
    let Some(fixture) = PgFixture::create().await else {
        return;
    };
    let store: Arc<dyn UsageStore> = Arc::new(fixture.store().await);
    let ledger = QuotaLedger::with_window(store, Duration::from_secs(1));

    ledger.record_and_check("guest").await.unwrap();
    let second = ledger.record_and_check("guest").await.unwrap();
    assert_eq!(second.status.used(), 2);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let reset = ledger.record_and_check("guest").await.unwrap();
    assert_eq!(reset.status.used(), 1);
    assert!(matches!(
        reset.status.usage,
        QuotaUsage::Window {
            window_remaining_seconds: Some(1),
            ..
        }
    ));

    fixture.cleanup().await;
}
