// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Gemini REST provider
//!
//! Calls `{base}/models/{model}:generateContent`. The HTTP client (and its
//! connection pool) is shared across requests; the API key is carried only by
//! the per-request [`GeminiGenerator`].

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::fmt;
use tracing::debug;

use super::provider::{GeneratorFactory, TextGenerator};
use super::types::ProviderError;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Hands out Gemini generators that share one HTTP client
#[derive(Clone)]
pub struct GeminiFactory {
    http: Client,
    base_url: String,
}

impl GeminiFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl GeneratorFactory for GeminiFactory {
    fn create(&self, api_key: &str) -> Box<dyn TextGenerator> {
        Box::new(GeminiGenerator {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            api_key: api_key.to_string(),
        })
    }
}

/// Gemini client bound to one credential
pub struct GeminiGenerator {
    http: Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for GeminiGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiGenerator")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl GeminiGenerator {
    fn api_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn request_body(prompt: &str) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }]
        })
    }

    /// Join the non-thought text parts of the first candidate
    pub fn extract_text(response: &Value) -> Option<String> {
        let parts = response["candidates"][0]["content"]["parts"].as_array()?;
        let text: String = parts
            .iter()
            .filter(|p| !p["thought"].as_bool().unwrap_or(false))
            .filter_map(|p| p["text"].as_str())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Pull `error.message` out of an error body, else use the raw text
    pub fn error_message(body: &str) -> String {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| body.trim().to_string())
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        debug!("Gemini request to model {}", model);

        let response = self
            .http
            .post(self.api_url(model))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&Self::request_body(prompt))
            .send()
            .await
            .map_err(|e| ProviderError::new(format!("Gemini request failed: {}", e.without_url())))?;

        let status = response.status();
        if status.is_success() {
            let json: Value = response.json().await.map_err(|e| {
                ProviderError::new(format!("Failed to parse Gemini response: {}", e.without_url()))
            })?;
            return Self::extract_text(&json).ok_or_else(|| {
                let reason = json["candidates"][0]["finishReason"]
                    .as_str()
                    .or_else(|| json["promptFeedback"]["blockReason"].as_str())
                    .unwrap_or("no text returned");
                ProviderError::new(format!("Gemini returned an empty response ({})", reason))
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::with_status(
            status.as_u16(),
            Self::error_message(&body),
        ))
    }
}
