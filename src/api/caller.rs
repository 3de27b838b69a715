// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-request caller context extractor

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::{AUTHORIZATION, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::response::Response;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use super::http_server::AppState;
use crate::identity::{bucket_key, client_ip, GuestIdentity};

/// Who is calling: guest identity, client IP and optional bearer credential
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub identity: GuestIdentity,
    pub client_ip: String,
    /// Provider credential passed through from `Authorization: Bearer`
    pub bearer_token: Option<String>,
}

impl CallerContext {
    pub fn guest_id(&self) -> &str {
        &self.identity.guest_id
    }

    pub fn bucket_key(&self) -> String {
        bucket_key(&self.identity.guest_id, &self.client_ip)
    }

    /// Attach the `Set-Cookie` header when the identity was minted here
    pub fn persist_identity(&self, response: &mut Response) {
        if let Some(cookie) = &self.identity.set_cookie {
            if let Ok(value) = HeaderValue::from_str(cookie) {
                response.headers_mut().append(SET_COOKIE, value);
            }
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CallerContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(CallerContext {
            identity: state.identity.resolve(&parts.headers),
            client_ip: client_ip(&parts.headers, peer),
            bearer_token: bearer_token(parts),
        })
    }
}
