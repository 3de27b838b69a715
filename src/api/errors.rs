// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::generation::GenerationError;
use crate::quota::{QuotaError, QUOTA_EXCEEDED_MESSAGE};
use crate::vault::VaultError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    InvalidRequest(String),
    Forbidden(String),
    QuotaExceeded,
    PayloadTooLarge(String),
    RateLimitExceeded { retry_after: u64 },
    InternalError(String),
    ServiceUnavailable(String),
    Timeout,
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let (error_type, message, retry_after) = match self {
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone(), None),
            ApiError::Forbidden(msg) => ("forbidden", msg.clone(), None),
            ApiError::QuotaExceeded => ("quota_exceeded", QUOTA_EXCEEDED_MESSAGE.to_string(), None),
            ApiError::PayloadTooLarge(msg) => ("payload_too_large", msg.clone(), None),
            ApiError::RateLimitExceeded { retry_after } => (
                "rate_limit_exceeded",
                format!(
                    "Too many requests. Please wait {} seconds and try again.",
                    retry_after
                ),
                Some(*retry_after),
            ),
            ApiError::InternalError(msg) => ("internal_error", msg.clone(), None),
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg.clone(), None),
            ApiError::Timeout => (
                "timeout",
                "The AI service took too long to respond. Please try again.".to_string(),
                None,
            ),
        };

        ErrorResponse {
            error: error_type.to_string(),
            message,
            retry_after,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_) => 400,
            ApiError::Forbidden(_) | ApiError::QuotaExceeded => 403,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::RateLimitExceeded { .. } => 429,
            ApiError::InternalError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::Timeout => 504,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::QuotaExceeded => write!(f, "Free tier quota exceeded"),
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ApiError::RateLimitExceeded { retry_after } => write!(
                f,
                "Rate limit exceeded, retry after {} seconds",
                retry_after
            ),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::Timeout => write!(f, "Request timed out"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = self.to_response();

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimitExceeded { retry_after } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

// Provider text stays in the logs; clients get a fixed message per class.
impl From<GenerationError> for ApiError {
    fn from(error: GenerationError) -> Self {
        match error {
            GenerationError::EmptyPrompt => ApiError::InvalidRequest("Prompt is required".to_string()),
            GenerationError::Unauthorized(_) => ApiError::Forbidden(
                "AI service limit reached or invalid API key. Please contact support.".to_string(),
            ),
            GenerationError::PayloadTooLarge(_) => ApiError::PayloadTooLarge(
                "Your notes are too large for the AI model. Try uploading fewer files.".to_string(),
            ),
            GenerationError::Timeout { .. } => ApiError::Timeout,
            GenerationError::Upstream { .. } | GenerationError::CandidatesExhausted { .. } => {
                ApiError::InternalError(
                    "Failed to get response from AI. Please try again later.".to_string(),
                )
            }
        }
    }
}

impl From<QuotaError> for ApiError {
    fn from(_: QuotaError) -> Self {
        ApiError::ServiceUnavailable(
            "Usage tracking is temporarily unavailable. Please try again later.".to_string(),
        )
    }
}

impl From<VaultError> for ApiError {
    fn from(error: VaultError) -> Self {
        match error {
            VaultError::NoMarkdownFiles => ApiError::InvalidRequest(error.to_string()),
            VaultError::Storage(_) => ApiError::InternalError("Database error".to_string()),
        }
    }
}
