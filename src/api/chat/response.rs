// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chat response types

use serde::Serialize;

use crate::quota::QuotaStatus;
use crate::rate_limit::RateLimitInfo;

/// Response body for POST /api/proxy/chat
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Generated answer
    pub response: String,
    /// Model that produced the answer
    pub model: String,
    pub rate_limit: RateLimitInfo,
    pub quota: QuotaStatus,
}
