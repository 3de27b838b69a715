// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chat request types

use serde::{Deserialize, Serialize};

use crate::generation::GenerationRequest;

/// Request body for POST /api/proxy/chat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The question (required, non-blank)
    #[serde(default)]
    pub prompt: String,

    /// Concatenated notes; the stored vault is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Preferred model, tried before the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("Prompt is required".to_string());
        }
        Ok(())
    }

    /// Explicit non-blank context, if any
    pub fn explicit_context(&self) -> Option<&str> {
        self.context.as_deref().filter(|c| !c.trim().is_empty())
    }

    pub fn into_generation(self, context: Option<String>) -> GenerationRequest {
        GenerationRequest {
            prompt: self.prompt,
            context,
            model: self.model.filter(|m| !m.trim().is_empty()),
        }
    }
}
