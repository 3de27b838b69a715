// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text generation through a hosted LLM provider

pub mod gateway;
pub mod gemini;
pub mod prompt;
pub mod provider;
pub mod types;

pub use gateway::{GenerationGateway, FALLBACK_MODELS};
pub use gemini::{GeminiFactory, GeminiGenerator};
pub use prompt::{build_prompt, truncate_context};
pub use provider::{GeneratorFactory, TextGenerator};
pub use types::{
    FailureKind, GenerationError, GenerationOutput, GenerationRequest, ProviderError,
};
