// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vault upload endpoint
//!
//! Provides `POST /api/upload` for multipart Markdown uploads.

pub mod handler;

pub use handler::{upload_handler, UploadResponse};
