// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Usage endpoint
//!
//! Provides `GET /api/proxy/usage`, a read-only view of limits.

pub mod handler;

pub use handler::usage_handler;
