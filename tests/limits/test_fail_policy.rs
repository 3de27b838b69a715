// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tests for behaviour while the shared store is unreachable

use std::sync::Arc;
use std::time::Duration;
use vault_chat_proxy::config::QuotaMode;
use vault_chat_proxy::quota::{QuotaError, QuotaLedger};
use vault_chat_proxy::rate_limit::{TokenBucketConfig, TokenBucketLimiter};
use vault_chat_proxy::storage::MemoryUsageStore;

#[tokio::test]
async fn test_rate_limiter_fails_open() {
    let store = Arc::new(MemoryUsageStore::new());
    let limiter = TokenBucketLimiter::new(store.clone(), TokenBucketConfig::per_minute(1));

    assert!(limiter.admit("k").await.allowed);
    assert!(!limiter.admit("k").await.allowed);

    store.set_unavailable(true);
    let decision = limiter.admit("k").await;
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 1);
}

#[tokio::test]
async fn test_quota_fails_closed() {
    let store = Arc::new(MemoryUsageStore::new());
    store.set_unavailable(true);

    for mode in [QuotaMode::Count { total: 30 }, QuotaMode::Window { minutes: 5 }] {
        let ledger = QuotaLedger::new(store.clone(), mode);
        assert!(matches!(
            ledger.record_and_check("guest").await,
            Err(QuotaError::Unavailable(_))
        ));
    }
}

#[tokio::test]
async fn test_recovery_after_outage() {
    let store = Arc::new(MemoryUsageStore::new());
    let ledger = QuotaLedger::with_window(store.clone(), Duration::from_secs(60));

    store.set_unavailable(true);
    assert!(ledger.record_and_check("guest").await.is_err());

    store.set_unavailable(false);
    let outcome = ledger.record_and_check("guest").await.unwrap();
    assert!(outcome.allowed);
    assert_eq!(outcome.status.used(), 1);
}
