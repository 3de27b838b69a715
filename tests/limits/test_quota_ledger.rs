// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tests for the guest quota ledger in count and window modes

use std::sync::Arc;
use std::time::Duration;
use vault_chat_proxy::config::QuotaMode;
use vault_chat_proxy::quota::{QuotaLedger, QuotaUsage};
use vault_chat_proxy::storage::MemoryUsageStore;

fn window_seconds(usage: &QuotaUsage) -> u64 {
    match usage {
        QuotaUsage::Window {
            window_remaining_seconds: Some(secs),
            ..
        } => *secs,
        other => panic!("expected window usage, got {:?}", other),
    }
}

#[tokio::test]
async fn test_count_mode_boundary_at_thirty() {
    let ledger = QuotaLedger::new(
        Arc::new(MemoryUsageStore::new()),
        QuotaMode::Count { total: 30 },
    );

    for n in 1..=30 {
        let outcome = ledger.record_and_check("guest").await.unwrap();
        assert!(outcome.allowed, "Request {} should be admitted", n);
    }

    let outcome = ledger.record_and_check("guest").await.unwrap();
    assert!(!outcome.allowed, "31st request should be rejected");
    assert_eq!(
        outcome.status.usage,
        QuotaUsage::Count {
            total: 30,
            used: 31,
            remaining: 0
        }
    );
}

#[tokio::test]
async fn test_guests_are_counted_separately() {
    let ledger = QuotaLedger::new(
        Arc::new(MemoryUsageStore::new()),
        QuotaMode::Count { total: 1 },
    );

    assert!(ledger.record_and_check("a").await.unwrap().allowed);
    assert!(!ledger.record_and_check("a").await.unwrap().allowed);
    assert!(ledger.record_and_check("b").await.unwrap().allowed);
}

#[tokio::test]
async fn test_window_mode_never_blocks_thousand_requests() {
    let ledger = QuotaLedger::new(
        Arc::new(MemoryUsageStore::new()),
        QuotaMode::Window { minutes: 60 },
    );

    for _ in 0..1000 {
        assert!(ledger.record_and_check("guest").await.unwrap().allowed);
    }
    let (status, warning) = ledger.snapshot("guest").await;
    assert!(warning.is_none());
    assert_eq!(status.used(), 1000);
}

#[tokio::test]
async fn test_window_remaining_decreases_then_resets() {
    let window = Duration::from_secs(2);
    let ledger = QuotaLedger::with_window(Arc::new(MemoryUsageStore::new()), window);

    let first = ledger.record_and_check("guest").await.unwrap();
    assert_eq!(window_seconds(&first.status.usage), 2);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let second = ledger.record_and_check("guest").await.unwrap();
    assert_eq!(window_seconds(&second.status.usage), 1);
    assert_eq!(second.status.used(), 2);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let reset = ledger.record_and_check("guest").await.unwrap();
    assert_eq!(window_seconds(&reset.status.usage), 2);
    assert_eq!(reset.status.used(), 1);
}
