// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Route registration tests
//!
//! These tests verify that:
//! - Every endpoint is mounted at its path with the expected method
//! - Wrong methods are rejected
//! - The health endpoint reports the storage backend

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};

use crate::support::{test_config, ScriptedFactory, TestApp};

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[cfg(test)]
mod route_registration_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_reports_memory_backend() {
        let app = TestApp::new(test_config(), ScriptedFactory::answering("ok"));
        let response = app.send(request(Method::GET, "/health")).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["status"], "ok");
        assert_eq!(response.body["storage"], "memory");
        assert_eq!(response.body["storageReachable"], true);
        assert!(response.body["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_health_degraded_when_store_down() {
        let app = TestApp::new(test_config(), ScriptedFactory::answering("ok"));
        app.store.set_unavailable(true);

        let response = app.send(request(Method::GET, "/health")).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["status"], "degraded");
    }

    #[tokio::test]
    async fn test_chat_rejects_get() {
        let app = TestApp::new(test_config(), ScriptedFactory::answering("ok"));
        let response = app.send(request(Method::GET, "/api/proxy/chat")).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_usage_rejects_post() {
        let app = TestApp::new(test_config(), ScriptedFactory::answering("ok"));
        let response = app.send(request(Method::POST, "/api/proxy/usage")).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_upload_rejects_get() {
        let app = TestApp::new(test_config(), ScriptedFactory::answering("ok"));
        let response = app.send(request(Method::GET, "/api/upload")).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = TestApp::new(test_config(), ScriptedFactory::answering("ok"));
        let response = app.send(request(Method::GET, "/v1/inference")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }
}
