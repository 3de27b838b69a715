// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::debug;

use crate::api::caller::CallerContext;
use crate::api::http_server::AppState;

/// GET /api/proxy/usage - Remaining rate-limit tokens and quota
///
/// Never consumes a token or counts a request, and always answers 200; a
/// `warning` field is added when usage data could not be read.
pub async fn usage_handler(State(state): State<Arc<AppState>>, caller: CallerContext) -> Response {
    let report = state
        .usage
        .report(caller.guest_id(), &caller.bucket_key())
        .await;
    debug!(
        "Usage for guest {}: {} tokens, {} requests",
        caller.guest_id(),
        report.rate_limit.remaining,
        report.quota.used()
    );

    let mut response = Json(report).into_response();
    caller.persist_identity(&mut response);
    response
}
