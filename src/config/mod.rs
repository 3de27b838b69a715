// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the chat proxy
//!
//! Every option is read from the environment (optionally seeded from a
//! `.env` file by the binary). Both the enforcing chat path and the
//! read-only usage path are built from the same [`ProxyConfig`], so the
//! rate limit they report can never drift apart.

pub mod database;

use std::env;
use std::str::FromStr;
use std::time::Duration;

pub use database::{DatabaseConfig, SslMode};

/// Default model tried after any caller-requested model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default generation endpoint (Gemini REST API)
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// How the long-horizon guest quota is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaMode {
    /// Fixed lifetime number of requests per guest
    Count { total: u32 },
    /// Rolling window that resets the counter once expired (advisory only)
    Window { minutes: u32 },
}

impl QuotaMode {
    pub fn name(&self) -> &'static str {
        match self {
            QuotaMode::Count { .. } => "count",
            QuotaMode::Window { .. } => "window",
        }
    }
}

/// Top-level proxy configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address the HTTP server binds to
    pub listen_addr: String,
    /// Server-side credential for the generation provider
    pub ai_api_key: Option<String>,
    /// Base URL of the generation provider
    pub ai_api_base: String,
    /// Model tried after the caller's requested model
    pub default_model: String,
    /// Upper bound on a single provider call
    pub generation_timeout: Duration,
    /// Notes context longer than this (in characters) is truncated
    pub max_context_chars: usize,
    /// Token-bucket capacity; refills over one minute
    pub rate_limit_per_minute: u32,
    /// Guest quota interpretation
    pub quota_mode: QuotaMode,
    /// Persistent store; `None` runs with process-local counters
    pub database: Option<DatabaseConfig>,
    /// Always mark the guest cookie `Secure`
    pub force_secure_cookie: bool,
    /// Variables that were set but not a valid number for their setting
    pub rejected_vars: Vec<String>,
}

impl ProxyConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut rejected = Vec::new();

        let listen_addr = lookup("LISTEN_ADDR").unwrap_or_else(|| {
            format!(
                "0.0.0.0:{}",
                lookup("API_PORT").unwrap_or_else(|| "8080".to_string())
            )
        });

        let window_minutes =
            number::<u32, _>(&lookup, "FREE_QUOTA_WINDOW_MINUTES", &mut rejected).unwrap_or(0);
        let quota_mode = if window_minutes > 0 {
            QuotaMode::Window {
                minutes: window_minutes,
            }
        } else {
            QuotaMode::Count {
                total: number::<u32, _>(&lookup, "FREE_QUOTA_TOTAL", &mut rejected).unwrap_or(30),
            }
        };

        Self {
            listen_addr,
            ai_api_key: lookup("AI_API_KEY").filter(|k| !k.trim().is_empty()),
            ai_api_base: lookup("AI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            default_model: lookup("AI_MODEL")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            generation_timeout: Duration::from_secs(
                number::<u64, _>(&lookup, "AI_TIMEOUT_SECS", &mut rejected).unwrap_or(30),
            ),
            max_context_chars: number::<usize, _>(&lookup, "MAX_CONTEXT_CHARS", &mut rejected)
                .unwrap_or(15_000),
            rate_limit_per_minute: number::<u32, _>(&lookup, "RATE_LIMIT_PER_MINUTE", &mut rejected)
                .unwrap_or(5),
            quota_mode,
            database: DatabaseConfig::from_lookup(&lookup),
            force_secure_cookie: lookup("COOKIE_SECURE")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
            rejected_vars: rejected,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.rejected_vars.is_empty() {
            return Err(format!(
                "invalid numeric value for {}",
                self.rejected_vars.join(", ")
            ));
        }
        if self.rate_limit_per_minute == 0 {
            return Err("RATE_LIMIT_PER_MINUTE must be greater than 0".to_string());
        }
        if let QuotaMode::Count { total: 0 } = self.quota_mode {
            return Err("FREE_QUOTA_TOTAL must be greater than 0".to_string());
        }
        if self.generation_timeout.is_zero() {
            return Err("AI_TIMEOUT_SECS must be greater than 0".to_string());
        }
        if self.max_context_chars == 0 {
            return Err("MAX_CONTEXT_CHARS must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            ai_api_key: None,
            ai_api_base: DEFAULT_API_BASE.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            generation_timeout: Duration::from_secs(30),
            max_context_chars: 15_000,
            rate_limit_per_minute: 5,
            quota_mode: QuotaMode::Count { total: 30 },
            database: None,
            force_secure_cookie: false,
            rejected_vars: Vec::new(),
        }
    }
}

/// Parse a numeric variable; blank counts as unset, anything else that does
/// not fit `T` is recorded in `rejected`
fn number<T, F>(lookup: &F, key: &str, rejected: &mut Vec<String>) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            rejected.push(key.to_string());
            None
        }
    }
}
