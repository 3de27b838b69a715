// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vault_chat_proxy::{
    config::{ProxyConfig, QuotaMode},
    generation::GeminiFactory,
    storage::{MemoryUsageStore, PgUsageStore, UsageStore},
    version, AppState,
};

/// Chat-with-your-notes proxy server
#[derive(Parser, Debug)]
#[command(name = "vault-chat-proxy")]
#[command(version)]
#[command(about = "Guest-limited proxy between a notes UI and a hosted LLM", long_about = None)]
struct Args {
    /// Address to bind (overrides LISTEN_ADDR / API_PORT)
    #[arg(long)]
    listen_addr: Option<String>,

    /// Token-bucket capacity per minute (overrides RATE_LIMIT_PER_MINUTE)
    #[arg(long)]
    rate_limit_per_minute: Option<u32>,

    /// Skip loading a `.env` file
    #[arg(long, env = "NO_DOTENV", default_value_t = false)]
    no_dotenv: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if !args.no_dotenv {
        dotenv::dotenv().ok();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting {}", version::get_version_string());

    let mut config = ProxyConfig::from_env();
    if let Some(addr) = args.listen_addr {
        config.listen_addr = addr;
    }
    if let Some(limit) = args.rate_limit_per_minute {
        config.rate_limit_per_minute = limit;
    }
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    let store: Arc<dyn UsageStore> = match &config.database {
        Some(database) => Arc::new(
            PgUsageStore::connect_lazy(database).context("invalid database configuration")?,
        ),
        None => {
            warn!("No POSTGRES_URL or DATABASE_URL set; using in-memory counters (single instance only)");
            Arc::new(MemoryUsageStore::new())
        }
    };

    if config.ai_api_key.is_none() {
        warn!("AI_API_KEY not set; chat requests need an Authorization bearer credential");
    }

    let quota_limit = match config.quota_mode {
        QuotaMode::Count { total } => format!("{} requests", total),
        QuotaMode::Window { minutes } => format!("{} minute window", minutes),
    };
    info!(
        "Rate limit {}/min, {} quota ({}), default model {}",
        config.rate_limit_per_minute,
        config.quota_mode.name(),
        quota_limit,
        config.default_model
    );

    let factory = Arc::new(GeminiFactory::new(config.ai_api_base.clone()));
    let state = AppState::new(config, store, factory);

    vault_chat_proxy::start_server(state)
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}
