// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Database connection settings
//!
//! The connection string and its TLS mode are resolved in exactly one place.
//! Precedence for the TLS mode: `DATABASE_SSL_MODE`, then an `sslmode`
//! query parameter already present in the URL, then `require`.

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// TLS requirement for the database connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    Disable,
    Prefer,
    Require,
}

impl FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disable" | "false" | "off" => Ok(SslMode::Disable),
            "prefer" | "allow" => Ok(SslMode::Prefer),
            "require" | "verify-ca" | "verify-full" | "true" | "on" => Ok(SslMode::Require),
            other => Err(format!("unknown ssl mode '{}'", other)),
        }
    }
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Raw connection string from `POSTGRES_URL` or `DATABASE_URL`
    pub url: String,
    /// Explicit TLS override from `DATABASE_SSL_MODE`
    pub ssl_mode: Option<SslMode>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ssl_mode: None,
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }

    /// Returns `None` when neither `POSTGRES_URL` nor `DATABASE_URL` is set
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("POSTGRES_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .filter(|u| !u.trim().is_empty())?;

        let mut config = Self::new(url.trim());
        config.ssl_mode = lookup("DATABASE_SSL_MODE").and_then(|v| v.parse().ok());
        if let Some(max) = lookup("DATABASE_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
            config.max_connections = max;
        }
        Some(config)
    }

    /// TLS mode after applying the precedence rules
    pub fn effective_ssl_mode(&self) -> SslMode {
        if let Some(mode) = self.ssl_mode {
            return mode;
        }
        Url::parse(&self.url)
            .ok()
            .and_then(|u| {
                u.query_pairs()
                    .find(|(k, _)| k == "sslmode")
                    .and_then(|(_, v)| v.parse().ok())
            })
            .unwrap_or(SslMode::Require)
    }

    /// Connection options with the effective TLS mode applied
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        let options = PgConnectOptions::from_str(&self.url)?;
        Ok(options.ssl_mode(self.effective_ssl_mode().into()))
    }

    /// Connection string safe for logs
    pub fn redacted_url(&self) -> String {
        match Url::parse(&self.url) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                url.to_string()
            }
            Err(_) => "<unparseable database url>".to_string(),
        }
    }
}
