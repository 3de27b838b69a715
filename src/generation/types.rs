// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use thiserror::Error;

/// Failure reported by a generation provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    /// HTTP status returned by the provider, if any
    pub status: Option<u16>,
    pub message: String,
}

/// Coarse classification of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Invalid credential, or the provider account's own quota is spent
    Auth,
    /// Request or context too large for the model
    PayloadTooLarge,
    /// Model not found or not supported; the next candidate may work
    ModelUnavailable,
    Other,
}

const AUTH_PATTERNS: &[&str] = &[
    "api key",
    "api_key",
    "permission",
    "unauthenticated",
    "unauthorized",
    "quota",
    "resource has been exhausted",
    "rate limit",
];

const TOO_LARGE_PATTERNS: &[&str] = &[
    "too large",
    "payload size",
    "exceeds the maximum",
    "token limit",
    "request entity",
];

const MODEL_UNAVAILABLE_PATTERNS: &[&str] = &[
    "not found",
    "unsupported",
    "not supported",
    "not available",
];

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Classify by message text first, then by HTTP status
    pub fn kind(&self) -> FailureKind {
        let message = self.message.to_lowercase();
        let matches = |patterns: &[&str]| patterns.iter().any(|p| message.contains(p));

        if matches(AUTH_PATTERNS) || matches!(self.status, Some(401) | Some(403) | Some(429)) {
            FailureKind::Auth
        } else if matches(TOO_LARGE_PATTERNS) || self.status == Some(413) {
            FailureKind::PayloadTooLarge
        } else if matches(MODEL_UNAVAILABLE_PATTERNS) || self.status == Some(404) {
            FailureKind::ModelUnavailable
        } else {
            FailureKind::Other
        }
    }
}

/// One chat generation request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub context: Option<String>,
    pub model: Option<String>,
}

/// Successful generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutput {
    pub text: String,
    pub model_used: String,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("prompt is required")]
    EmptyPrompt,

    #[error("provider rejected the credential: {0}")]
    Unauthorized(ProviderError),

    #[error("request too large for the model: {0}")]
    PayloadTooLarge(ProviderError),

    #[error("provider error from {model}: {source}")]
    Upstream {
        model: String,
        #[source]
        source: ProviderError,
    },

    #[error("all candidate models failed; last error: {last}")]
    CandidatesExhausted { tried: Vec<String>, last: ProviderError },

    #[error("model {model} did not respond within {secs}s")]
    Timeout { model: String, secs: u64 },
}
