// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the vault chat proxy

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "guest-identity",
    "token-bucket-rate-limit",
    "guest-quota-count",
    "guest-quota-window",
    "model-fallback",
    "vault-upload",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Vault Chat Proxy {}", VERSION_NUMBER)
}
