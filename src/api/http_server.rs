// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::chat::chat_handler;
use super::upload::upload_handler;
use super::usage::usage_handler;
use crate::config::ProxyConfig;
use crate::generation::{GenerationGateway, GeneratorFactory};
use crate::identity::IdentityResolver;
use crate::quota::QuotaLedger;
use crate::rate_limit::{TokenBucketConfig, TokenBucketLimiter};
use crate::storage::UsageStore;
use crate::usage::UsageReporter;
use crate::vault::VaultStore;

/// Largest accepted upload body
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared request-handling state
pub struct AppState {
    pub config: ProxyConfig,
    pub store: Arc<dyn UsageStore>,
    pub identity: IdentityResolver,
    pub limiter: TokenBucketLimiter,
    pub quota: QuotaLedger,
    pub gateway: GenerationGateway,
    pub usage: UsageReporter,
    pub vault: VaultStore,
}

impl AppState {
    /// Wire every component from one configuration.
    ///
    /// The enforcing limiter and the usage reporter share one bucket shape.
    pub fn new(
        config: ProxyConfig,
        store: Arc<dyn UsageStore>,
        factory: Arc<dyn GeneratorFactory>,
    ) -> Self {
        let bucket = TokenBucketConfig::per_minute(config.rate_limit_per_minute);
        let limiter = TokenBucketLimiter::new(store.clone(), bucket);
        let quota = QuotaLedger::new(store.clone(), config.quota_mode);
        let gateway = GenerationGateway::new(
            factory,
            config.default_model.clone(),
            config.max_context_chars,
            config.generation_timeout,
        );

        Self {
            identity: IdentityResolver::new(config.force_secure_cookie),
            usage: UsageReporter::new(limiter.clone(), quota.clone()),
            vault: VaultStore::new(store.clone()),
            limiter,
            quota,
            gateway,
            store,
            config,
        }
    }

    /// Replace the bucket shape on both the enforcing and reporting paths
    pub fn with_bucket(mut self, bucket: TokenBucketConfig) -> Self {
        self.limiter = TokenBucketLimiter::new(self.store.clone(), bucket);
        self.usage = UsageReporter::new(self.limiter.clone(), self.quota.clone());
        self
    }

    /// Replace the quota ledger on both the enforcing and reporting paths
    pub fn with_quota(mut self, quota: QuotaLedger) -> Self {
        self.quota = quota;
        self.usage = UsageReporter::new(self.limiter.clone(), self.quota.clone());
        self
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Chat with notes
        .route("/api/proxy/chat", post(chat_handler))
        // Read-only usage view
        .route("/api/proxy/usage", get(usage_handler))
        // Vault upload
        .route(
            "/api/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(state: AppState) -> std::io::Result<()> {
    let addr = state.config.listen_addr.clone();
    let app = create_app(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let reachable = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Health check: storage unreachable: {}", e);
            false
        }
    };

    Json(json!({
        "status": if reachable { "ok" } else { "degraded" },
        "storage": state.store.backend(),
        "storageReachable": reachable,
        "version": crate::version::VERSION_NUMBER,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
