// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chat endpoint handler

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::request::ChatRequest;
use super::response::ChatResponse;
use crate::api::caller::CallerContext;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::rate_limit::BucketDecision;

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// POST /api/proxy/chat - Answer a question from the caller's notes
///
/// # Request
/// - `prompt`: The question (required)
/// - `context`: Concatenated notes (optional; the stored vault is used when absent)
/// - `model`: Preferred model (optional)
///
/// # Response
/// - `response`: Generated answer
/// - `model`: Model that produced it
/// - `rateLimit`: `{ limit, remaining }`
/// - `quota`: Guest quota after this request
///
/// Every response carries `X-RateLimit-Limit` / `X-RateLimit-Remaining`, and
/// `Set-Cookie` when a guest identity was minted for this request.
///
/// # Errors
/// - 400 Bad Request: Missing prompt or malformed JSON
/// - 403 Forbidden: Quota exhausted or provider rejected the credential
/// - 413 Payload Too Large: Notes too large for the model
/// - 429 Too Many Requests: Rate limited (with `Retry-After`)
/// - 500 Internal Server Error: Provider failure or no credential configured
/// - 503 Service Unavailable: Quota store unreachable
/// - 504 Gateway Timeout: Provider did not answer in time
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let key = caller.bucket_key();
    let decision = state.limiter.admit(&key).await;

    let result = if decision.allowed {
        answer(&state, &caller, body, decision).await
    } else {
        Err(ApiError::RateLimitExceeded {
            retry_after: decision.retry_after_secs,
        })
    };

    let mut response = match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => e.into_response(),
    };
    apply_rate_limit_headers(response.headers_mut(), &decision);
    caller.persist_identity(&mut response);
    response
}

async fn answer(
    state: &AppState,
    caller: &CallerContext,
    body: Result<Json<ChatRequest>, JsonRejection>,
    decision: BucketDecision,
) -> Result<ChatResponse, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        warn!("Rejected chat body: {}", rejection.body_text());
        ApiError::InvalidRequest("Invalid JSON body".to_string())
    })?;

    if let Err(e) = request.validate() {
        warn!("Chat validation failed: {}", e);
        return Err(ApiError::InvalidRequest(e));
    }

    let api_key = caller
        .bearer_token
        .clone()
        .or_else(|| state.config.ai_api_key.clone())
        .ok_or_else(|| {
            error!("No provider credential configured and none supplied by caller");
            ApiError::InternalError("AI service is not configured".to_string())
        })?;

    let guest_id = caller.guest_id();
    let quota = state.quota.record_and_check(guest_id).await.map_err(|e| {
        error!("Quota check failed for guest {}: {}", guest_id, e);
        ApiError::from(e)
    })?;
    if !quota.allowed {
        return Err(ApiError::QuotaExceeded);
    }

    let context = match request.explicit_context() {
        Some(context) => Some(context.to_string()),
        None => {
            let stored = state.vault.load(guest_id).await;
            if stored.is_some() {
                debug!("Using stored vault as context for guest {}", guest_id);
            }
            stored
        }
    };

    let generation = request.into_generation(context);
    let output = state
        .gateway
        .generate(&api_key, &generation)
        .await
        .map_err(|e| {
            error!("Generation failed for guest {}: {}", guest_id, e);
            ApiError::from(e)
        })?;

    info!(
        "Chat answered for guest {} with {} ({} requests used)",
        guest_id,
        output.model_used,
        quota.status.used()
    );

    Ok(ChatResponse {
        response: output.text,
        model: output.model_used,
        rate_limit: decision.into(),
        quota: quota.status,
    })
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &BucketDecision) {
    headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(decision.remaining));
}
