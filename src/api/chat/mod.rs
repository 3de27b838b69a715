// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chat endpoint
//!
//! Provides `POST /api/proxy/chat`: questions answered from the caller's notes.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::chat_handler;
pub use request::ChatRequest;
pub use response::ChatResponse;
