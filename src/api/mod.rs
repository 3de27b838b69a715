// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod caller;
pub mod chat;
pub mod errors;
pub mod http_server;
pub mod upload;
pub mod usage;

pub use caller::CallerContext;
pub use chat::{chat_handler, ChatRequest, ChatResponse};
pub use errors::{ApiError, ErrorResponse};
pub use http_server::{create_app, start_server, AppState, MAX_UPLOAD_BYTES};
pub use upload::{upload_handler, UploadResponse};
pub use usage::usage_handler;
