// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Usage endpoint tests
//!
//! These tests verify that:
//! - The usage view reports the same limit the chat path enforces
//! - Reading usage never consumes tokens or counts requests
//! - Store failures degrade to defaults with a warning instead of erroring

use axum::http::StatusCode;
use serde_json::json;
use std::time::Duration;
use vault_chat_proxy::config::QuotaMode;
use vault_chat_proxy::quota::QuotaLedger;
use vault_chat_proxy::rate_limit::TokenBucketConfig;

use crate::support::{chat_request, test_config, usage_request, ScriptedFactory, TestApp};

#[cfg(test)]
mod usage_tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_guest_usage() {
        let app = TestApp::new(test_config(), ScriptedFactory::answering("ok"));
        let response = app.send(usage_request(None)).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.body,
            json!({
                "rateLimit": {"limit": 5, "remaining": 5},
                "quota": {"type": "guest", "mode": "count", "total": 30, "used": 0, "remaining": 30}
            })
        );
        assert_eq!(response.set_cookie_count(), 1);
        assert_eq!(app.store.bucket_count(), 0);
        assert_eq!(app.store.guest_count(), 0);
    }

    #[tokio::test]
    async fn test_usage_reflects_chat_without_consuming() {
        let mut config = test_config();
        config.rate_limit_per_minute = 7;
        let app = TestApp::new(config, ScriptedFactory::answering("ok"));
        let cookie = "guest_id=usage-test";

        app.send(chat_request(json!({"prompt": "q"}), Some(cookie))).await;
        app.send(chat_request(json!({"prompt": "q"}), Some(cookie))).await;

        for _ in 0..3 {
            let response = app.send(usage_request(Some(cookie))).await;
            assert_eq!(response.body["rateLimit"]["limit"], 7);
            assert_eq!(response.body["rateLimit"]["remaining"], 5);
            assert_eq!(response.body["quota"]["used"], 2);
            assert_eq!(response.body["quota"]["remaining"], 28);
        }
    }

    #[tokio::test]
    async fn test_window_mode_usage() {
        let mut config = test_config();
        config.quota_mode = QuotaMode::Window { minutes: 15 };
        let app = TestApp::new(config, ScriptedFactory::answering("ok"));

        let fresh = app.send(usage_request(Some("guest_id=w"))).await;
        assert_eq!(fresh.body["quota"]["mode"], "window");
        assert_eq!(fresh.body["quota"]["windowMinutes"], 15);
        assert_eq!(fresh.body["quota"]["windowRemainingSeconds"], 900);
        assert_eq!(fresh.body["quota"]["used"], 0);

        app.send(chat_request(json!({"prompt": "q"}), Some("guest_id=w"))).await;
        let after = app.send(usage_request(Some("guest_id=w"))).await;
        assert_eq!(after.body["quota"]["used"], 1);
        assert!(after.body["quota"]["windowRemainingSeconds"].as_u64().unwrap() <= 900);
    }

    #[tokio::test]
    async fn test_store_down_degrades_with_warning() {
        let app = TestApp::new(test_config(), ScriptedFactory::answering("ok"));
        app.store.set_unavailable(true);

        let response = app.send(usage_request(Some("guest_id=g"))).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["rateLimit"]["remaining"], 5);
        assert_eq!(response.body["quota"]["used"], 0);
        assert_eq!(response.body["quota"]["remaining"], 30);
        assert!(response.body["warning"].is_string());
    }

    #[tokio::test]
    async fn test_window_store_down_omits_remaining_seconds() {
        let mut config = test_config();
        config.quota_mode = QuotaMode::Window { minutes: 15 };
        let app = TestApp::new(config, ScriptedFactory::answering("ok"));
        app.store.set_unavailable(true);

        let response = app.send(usage_request(Some("guest_id=g"))).await;
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body["quota"].get("windowRemainingSeconds").is_none());
        assert!(response.body["warning"].is_string());
    }

    #[tokio::test]
    async fn test_usage_reports_custom_bucket_limit() {
        let app = TestApp::customized(test_config(), ScriptedFactory::answering("ok"), |state| {
            state.with_bucket(TokenBucketConfig::per_minute(12))
        });
        let cookie = "guest_id=custom-bucket";

        app.send(chat_request(json!({"prompt": "q"}), Some(cookie))).await;
        let response = app.send(usage_request(Some(cookie))).await;

        assert_eq!(response.body["rateLimit"], json!({"limit": 12, "remaining": 11}));
    }

    #[tokio::test]
    async fn test_usage_window_resets_after_expiry() {
        let app = TestApp::customized(test_config(), ScriptedFactory::answering("ok"), |state| {
            let ledger = QuotaLedger::with_window(state.store.clone(), Duration::from_secs(1));
            state.with_quota(ledger)
        });
        let cookie = "guest_id=window-reset";

        for _ in 0..2 {
            let response = app.send(chat_request(json!({"prompt": "q"}), Some(cookie))).await;
            assert_eq!(response.status, StatusCode::OK);
        }
        let during = app.send(usage_request(Some(cookie))).await;
        assert_eq!(during.body["quota"]["mode"], "window");
        assert_eq!(during.body["quota"]["used"], 2);

        tokio::time::sleep(Duration::from_millis(1300)).await;

        let after = app.send(usage_request(Some(cookie))).await;
        assert_eq!(after.body["quota"]["used"], 0);
        assert_eq!(after.body["quota"]["windowRemainingSeconds"], 1);
    }
}
