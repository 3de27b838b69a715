// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Guest identity tests
//!
//! These tests verify that:
//! - A request without a cookie mints a guest and sets exactly one cookie
//! - Requests carrying the same cookie share one quota row
//! - The cookie carries the Secure attribute only over TLS

use axum::http::StatusCode;
use serde_json::json;

use crate::support::{chat_request, test_config, usage_request, ScriptedFactory, TestApp};

#[cfg(test)]
mod identity_tests {
    use super::*;

    #[tokio::test]
    async fn test_cookie_minted_once_then_reused() {
        let app = TestApp::new(test_config(), ScriptedFactory::answering("ok"));

        let first = app.send(chat_request(json!({"prompt": "q"}), None)).await;
        assert_eq!(first.status, StatusCode::OK);
        assert_eq!(first.set_cookie_count(), 1);
        let cookie = first.guest_cookie().unwrap();
        assert!(cookie.starts_with("guest_id="));

        let second = app.send(chat_request(json!({"prompt": "q"}), Some(&cookie))).await;
        assert_eq!(second.status, StatusCode::OK);
        assert_eq!(second.set_cookie_count(), 0);
        assert_eq!(second.body["quota"]["used"], 2);
        assert_eq!(app.store.guest_count(), 1);
    }

    #[tokio::test]
    async fn test_new_guest_gets_fresh_quota_row() {
        let app = TestApp::new(test_config(), ScriptedFactory::answering("ok"));

        app.send(chat_request(json!({"prompt": "q"}), Some("guest_id=veteran"))).await;
        app.send(chat_request(json!({"prompt": "q"}), Some("guest_id=veteran"))).await;

        let newcomer = app.send(chat_request(json!({"prompt": "q"}), None)).await;
        assert_eq!(newcomer.body["quota"]["used"], 1);
        assert_eq!(app.store.guest_count(), 2);
    }

    #[tokio::test]
    async fn test_cookie_value_used_verbatim() {
        let app = TestApp::new(test_config(), ScriptedFactory::answering("ok"));

        app.send(chat_request(json!({"prompt": "q"}), Some("theme=dark; guest_id=anything%20goes")))
            .await;
        let usage = app.send(usage_request(Some("guest_id=anything%20goes"))).await;
        assert_eq!(usage.body["quota"]["used"], 1);
    }

    #[tokio::test]
    async fn test_secure_cookie_only_over_tls() {
        let app = TestApp::new(test_config(), ScriptedFactory::answering("ok"));

        let plain = app.send(usage_request(None)).await;
        let cookie = plain.header("set-cookie").unwrap().to_string();
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=31536000"));
        assert!(!cookie.contains("Secure"));

        let mut request = usage_request(None);
        request
            .headers_mut()
            .insert("x-forwarded-proto", "https".parse().unwrap());
        let tls = app.send(request).await;
        assert!(tls.header("set-cookie").unwrap().ends_with("; Secure"));
    }
}
