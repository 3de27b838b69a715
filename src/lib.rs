// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod generation;
pub mod identity;
pub mod quota;
pub mod rate_limit;
pub mod storage;
pub mod usage;
pub mod vault;
pub mod version;

pub use api::{create_app, start_server, ApiError, AppState};
pub use config::{DatabaseConfig, ProxyConfig, QuotaMode};
pub use generation::{GeminiFactory, GenerationGateway, GeneratorFactory, TextGenerator};
pub use storage::{MemoryUsageStore, PgUsageStore, UsageStore};
