// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Provider seams
//!
//! A [`GeneratorFactory`] is shared by the whole server and hands out a
//! [`TextGenerator`] scoped to one request's credential.

use async_trait::async_trait;

use super::types::ProviderError;

/// A text generation backend bound to a single credential
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt` using `model`
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ProviderError>;
}

/// Builds a per-request [`TextGenerator`]
pub trait GeneratorFactory: Send + Sync {
    fn create(&self, api_key: &str) -> Box<dyn TextGenerator>;
}
