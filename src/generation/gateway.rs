// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model fallback over a per-request generator
//!
//! Candidates are tried in order: the caller's requested model, the
//! configured default, then the built-in fallbacks. Only a "model not found /
//! unsupported" failure moves on to the next candidate. Any other failure,
//! including a timeout, ends the attempt.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::prompt::build_prompt;
use super::provider::GeneratorFactory;
use super::types::{
    FailureKind, GenerationError, GenerationOutput, GenerationRequest, ProviderError,
};

/// Models tried after the requested and default models
pub const FALLBACK_MODELS: &[&str] = &["gemini-2.0-flash", "gemini-1.5-flash", "gemini-1.5-flash-latest"];

pub struct GenerationGateway {
    factory: Arc<dyn GeneratorFactory>,
    default_model: String,
    max_context_chars: usize,
    timeout: Duration,
}

impl GenerationGateway {
    pub fn new(
        factory: Arc<dyn GeneratorFactory>,
        default_model: impl Into<String>,
        max_context_chars: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            factory,
            default_model: default_model.into(),
            max_context_chars,
            timeout,
        }
    }

    /// Deduplicated candidate list in trial order
    pub fn candidate_models(&self, requested: Option<&str>) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::new();
        let ordered = requested
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .into_iter()
            .chain(std::iter::once(self.default_model.as_str()))
            .chain(FALLBACK_MODELS.iter().copied());

        for model in ordered {
            if !candidates.iter().any(|c| c == model) {
                candidates.push(model.to_string());
            }
        }
        candidates
    }

    /// Generate an answer with `api_key` as the provider credential.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::EmptyPrompt`] if the prompt is blank
    /// - [`GenerationError::Unauthorized`] / [`GenerationError::PayloadTooLarge`]
    ///   as classified from the provider's message
    /// - [`GenerationError::Timeout`] if a single call exceeds the timeout
    /// - [`GenerationError::CandidatesExhausted`] if every model was unavailable
    pub async fn generate(
        &self,
        api_key: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, GenerationError> {
        let question = request.prompt.trim();
        if question.is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let prompt = build_prompt(question, request.context.as_deref(), self.max_context_chars);
        let generator = self.factory.create(api_key);
        let candidates = self.candidate_models(request.model.as_deref());
        let mut last_error: Option<ProviderError> = None;

        for model in &candidates {
            let attempt = tokio::time::timeout(self.timeout, generator.generate(model, &prompt)).await;

            let error = match attempt {
                Err(_) => {
                    warn!("Model {} timed out after {:?}", model, self.timeout);
                    return Err(GenerationError::Timeout {
                        model: model.clone(),
                        secs: self.timeout.as_secs(),
                    });
                }
                Ok(Ok(text)) => {
                    info!("Generated {} chars with model {}", text.len(), model);
                    return Ok(GenerationOutput {
                        text,
                        model_used: model.clone(),
                    });
                }
                Ok(Err(error)) => error,
            };

            match error.kind() {
                FailureKind::ModelUnavailable => {
                    warn!("Model {} unavailable, trying next candidate: {}", model, error);
                    last_error = Some(error);
                }
                FailureKind::Auth => return Err(GenerationError::Unauthorized(error)),
                FailureKind::PayloadTooLarge => return Err(GenerationError::PayloadTooLarge(error)),
                FailureKind::Other => {
                    return Err(GenerationError::Upstream {
                        model: model.clone(),
                        source: error,
                    })
                }
            }
        }

        Err(GenerationError::CandidatesExhausted {
            tried: candidates,
            last: last_error.unwrap_or_else(|| ProviderError::new("no candidate models configured")),
        })
    }
}
