// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::api::caller::CallerContext;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vault::{VaultError, VaultFile};

/// Field names accepted for uploaded files
const FILE_FIELDS: [&str; 2] = ["files", "files[]"];

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub message: String,
    /// Number of Markdown files stored
    pub files: usize,
}

/// POST /api/upload - Replace the caller's stored vault
///
/// Accepts repeated `files` (or `files[]`) parts; only `.md` files are kept.
///
/// # Errors
/// - 400 Bad Request: Not multipart, unreadable part, or no `.md` files
/// - 500 Internal Server Error: Vault could not be stored
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    caller: CallerContext,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let result = store_upload(&state, &caller, multipart).await;

    let mut response = match result {
        Ok(files) => Json(UploadResponse {
            message: "Vault uploaded successfully".to_string(),
            files,
        })
        .into_response(),
        Err(e) => e.into_response(),
    };
    caller.persist_identity(&mut response);
    response
}

async fn store_upload(
    state: &AppState,
    caller: &CallerContext,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<usize, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        warn!("Rejected upload: {}", rejection);
        ApiError::InvalidRequest("Expected a multipart/form-data upload".to_string())
    })?;

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Failed to read upload part: {}", e);
        ApiError::InvalidRequest("File upload failed".to_string())
    })? {
        let is_file_field = field
            .name()
            .map(|name| FILE_FIELDS.contains(&name))
            .unwrap_or(false);
        if !is_file_field {
            continue;
        }
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let bytes = field.bytes().await.map_err(|e| {
            warn!("Failed to read uploaded file {}: {}", name, e);
            ApiError::InvalidRequest("File upload failed".to_string())
        })?;
        debug!("Received {} ({} bytes)", name, bytes.len());
        files.push(VaultFile::new(name, bytes.to_vec()));
    }

    state
        .vault
        .save(caller.guest_id(), &files)
        .await
        .map_err(|e| {
            match &e {
                VaultError::NoMarkdownFiles => {
                    warn!("Upload from guest {} had no Markdown files", caller.guest_id())
                }
                VaultError::Storage(_) => {
                    error!("Vault store failed for guest {}: {}", caller.guest_id(), e)
                }
            }
            ApiError::from(e)
        })
}
