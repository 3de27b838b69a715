// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Guest identity and client addressing
//!
//! The `guest_id` cookie is the only source of identity. A request without
//! one gets a freshly minted v4 UUID and a `Set-Cookie` header to persist it.

use axum::http::{header, HeaderMap};
use std::net::SocketAddr;
use uuid::Uuid;

pub const GUEST_COOKIE_NAME: &str = "guest_id";

/// One year, in seconds
pub const GUEST_COOKIE_MAX_AGE: u64 = 31_536_000;

/// Resolved caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestIdentity {
    pub guest_id: String,
    /// `Set-Cookie` value to send back when the ID was minted for this request
    pub set_cookie: Option<String>,
}

/// Split a `Cookie` header into trimmed name/value pairs.
///
/// Values are returned verbatim; no percent-decoding is applied.
pub fn parse_cookies(header_value: &str) -> Vec<(&str, &str)> {
    header_value
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name, value.trim()))
        })
        .collect()
}

/// Look up a cookie across every `Cookie` header on the request
pub fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(parse_cookies)
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver {
    force_secure: bool,
}

impl IdentityResolver {
    pub fn new(force_secure: bool) -> Self {
        Self { force_secure }
    }

    /// Read the guest cookie or mint a new identity. Never fails.
    pub fn resolve(&self, headers: &HeaderMap) -> GuestIdentity {
        if let Some(existing) = find_cookie(headers, GUEST_COOKIE_NAME).filter(|v| !v.is_empty()) {
            return GuestIdentity {
                guest_id: existing.to_string(),
                set_cookie: None,
            };
        }

        let guest_id = Uuid::new_v4().to_string();
        let secure = self.force_secure || is_https(headers);
        tracing::debug!("Minted guest identity {}", guest_id);

        GuestIdentity {
            set_cookie: Some(guest_cookie(&guest_id, secure)),
            guest_id,
        }
    }
}

/// `Set-Cookie` value persisting `guest_id` for one year
pub fn guest_cookie(guest_id: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        GUEST_COOKIE_NAME, guest_id, GUEST_COOKIE_MAX_AGE
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn is_https(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|proto| proto.trim().eq_ignore_ascii_case("https"))
        .unwrap_or(false)
}

/// Client IP: first `X-Forwarded-For` entry, then `X-Real-IP`, then the
/// socket peer, then `"unknown"`
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate bucket key for a guest on a given IP
pub fn bucket_key(guest_id: &str, client_ip: &str) -> String {
    format!("g:{}:ip:{}", guest_id, client_ip)
}
