// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Postgres-backed [`UsageStore`]
//!
//! Each mutation is a single `INSERT ... ON CONFLICT DO UPDATE ... RETURNING`
//! statement, so the read-modify-write happens under the row lock Postgres
//! takes for the upsert. Elapsed times are computed with the database clock
//! to keep multiple proxy instances consistent.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{BucketSnapshot, BucketState, QuotaRow, StorageError, UsageStore};
use crate::config::DatabaseConfig;

/// Advisory lock key serializing schema setup across proxy instances
pub const SCHEMA_LOCK_KEY: i64 = 0x7661_756c_7463_6870;

const SCHEMA: [&str; 4] = [
    r#"CREATE TABLE IF NOT EXISTS rate_limiter_buckets (
        key TEXT PRIMARY KEY,
        tokens DOUBLE PRECISION NOT NULL,
        last_refill TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        capacity INTEGER NOT NULL,
        refill_rate DOUBLE PRECISION NOT NULL
    )"#,
    "ALTER TABLE rate_limiter_buckets ADD COLUMN IF NOT EXISTS last_allowed BOOLEAN NOT NULL DEFAULT TRUE",
    r#"CREATE TABLE IF NOT EXISTS "GuestUsage" (
        guest_id TEXT PRIMARY KEY,
        requests_made INTEGER NOT NULL,
        first_request_at TIMESTAMPTZ NOT NULL,
        last_request_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "GuestVault" (
        guest_id TEXT PRIMARY KEY,
        vault_content TEXT
    )"#,
];

// Stored tokens plus the refill accrued since `last_refill`, capped at capacity.
macro_rules! refilled {
    () => {
        "LEAST(EXCLUDED.capacity::float8, rb.tokens + GREATEST(0, EXTRACT(EPOCH FROM (NOW() - rb.last_refill))::float8) * EXCLUDED.refill_rate)"
    };
}

const ADMIT_SQL: &str = concat!(
    "INSERT INTO rate_limiter_buckets AS rb ",
    "(key, tokens, last_refill, capacity, refill_rate, last_allowed) ",
    "VALUES ($1, $2::float8 - 1, NOW(), $2, $3, TRUE) ",
    "ON CONFLICT (key) DO UPDATE SET ",
    "tokens = CASE WHEN ",
    refilled!(),
    " >= 1 THEN ",
    refilled!(),
    " - 1 ELSE ",
    refilled!(),
    " END, ",
    "last_allowed = ",
    refilled!(),
    " >= 1, ",
    "last_refill = NOW(), ",
    "capacity = EXCLUDED.capacity, ",
    "refill_rate = EXCLUDED.refill_rate ",
    "RETURNING tokens, last_allowed AS allowed"
);

const PEEK_BUCKET_SQL: &str = "SELECT tokens, \
     GREATEST(0, EXTRACT(EPOCH FROM (NOW() - last_refill)))::float8 AS elapsed_secs \
     FROM rate_limiter_buckets WHERE key = $1";

const RECORD_COUNT_SQL: &str = r#"INSERT INTO "GuestUsage" AS gu (guest_id, requests_made, first_request_at, last_request_at)
     VALUES ($1, 1, NOW(), NOW())
     ON CONFLICT (guest_id) DO UPDATE SET
        requests_made = gu.requests_made + 1,
        last_request_at = NOW()
     RETURNING requests_made::int8 AS requests_made,
               GREATEST(0, EXTRACT(EPOCH FROM (NOW() - first_request_at)))::float8 AS elapsed_secs"#;

const RECORD_WINDOW_SQL: &str = r#"INSERT INTO "GuestUsage" AS gu (guest_id, requests_made, first_request_at, last_request_at)
     VALUES ($1, 1, NOW(), NOW())
     ON CONFLICT (guest_id) DO UPDATE SET
        last_request_at = NOW(),
        requests_made = CASE
            WHEN NOW() - gu.first_request_at <= make_interval(secs => $2) THEN gu.requests_made + 1
            ELSE 1
        END,
        first_request_at = CASE
            WHEN NOW() - gu.first_request_at <= make_interval(secs => $2) THEN gu.first_request_at
            ELSE NOW()
        END
     RETURNING requests_made::int8 AS requests_made,
               GREATEST(0, EXTRACT(EPOCH FROM (NOW() - first_request_at)))::float8 AS elapsed_secs"#;

const READ_QUOTA_SQL: &str = r#"SELECT requests_made::int8 AS requests_made,
        GREATEST(0, EXTRACT(EPOCH FROM (NOW() - first_request_at)))::float8 AS elapsed_secs
     FROM "GuestUsage" WHERE guest_id = $1"#;

const STORE_VAULT_SQL: &str = r#"INSERT INTO "GuestVault" (guest_id, vault_content)
     VALUES ($1, $2)
     ON CONFLICT (guest_id) DO UPDATE SET vault_content = EXCLUDED.vault_content"#;

const LOAD_VAULT_SQL: &str = r#"SELECT vault_content FROM "GuestVault" WHERE guest_id = $1"#;

/// Usage store backed by a lazily connected Postgres pool
pub struct PgUsageStore {
    pool: PgPool,
    schema: OnceCell<()>,
}

impl PgUsageStore {
    /// Build the pool without connecting; the first query opens a connection
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let options = config.connect_options()?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy_with(options);

        info!(
            "Postgres usage store configured for {} (ssl: {:?}, max connections: {})",
            config.redacted_url(),
            config.effective_ssl_mode(),
            config.max_connections
        );

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            schema: OnceCell::new(),
        }
    }

    /// Create the tables once per process.
    ///
    /// The DDL runs in one transaction holding [`SCHEMA_LOCK_KEY`], so
    /// instances starting together cannot collide on the catalog. A failed
    /// attempt leaves the cell empty so the next request retries.
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        self.schema
            .get_or_try_init(|| async {
                let mut tx = self.pool.begin().await?;
                sqlx::query("SELECT pg_advisory_xact_lock($1)")
                    .bind(SCHEMA_LOCK_KEY)
                    .execute(&mut *tx)
                    .await?;
                for statement in SCHEMA {
                    sqlx::query(statement).execute(&mut *tx).await?;
                }
                tx.commit().await?;
                debug!("usage store schema ensured");
                Ok::<(), StorageError>(())
            })
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!("Failed to ensure usage store schema: {}", e);
                e
            })
    }
}

#[async_trait]
impl UsageStore for PgUsageStore {
    async fn admit(
        &self,
        key: &str,
        capacity: u32,
        refill_rate: f64,
    ) -> Result<BucketState, StorageError> {
        let capacity = i32::try_from(capacity)
            .map_err(|_| StorageError::InvalidValue(format!("bucket capacity {}", capacity)))?;
        self.ensure_schema().await?;
        let state = sqlx::query_as::<_, BucketState>(ADMIT_SQL)
            .bind(key)
            .bind(capacity)
            .bind(refill_rate)
            .fetch_one(&self.pool)
            .await?;
        Ok(state)
    }

    async fn peek_bucket(&self, key: &str) -> Result<Option<BucketSnapshot>, StorageError> {
        self.ensure_schema().await?;
        let snapshot = sqlx::query_as::<_, BucketSnapshot>(PEEK_BUCKET_SQL)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(snapshot)
    }

    async fn record_count(&self, guest_id: &str) -> Result<QuotaRow, StorageError> {
        self.ensure_schema().await?;
        let row = sqlx::query_as::<_, QuotaRow>(RECORD_COUNT_SQL)
            .bind(guest_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn record_window(
        &self,
        guest_id: &str,
        window: Duration,
    ) -> Result<QuotaRow, StorageError> {
        self.ensure_schema().await?;
        let row = sqlx::query_as::<_, QuotaRow>(RECORD_WINDOW_SQL)
            .bind(guest_id)
            .bind(window.as_secs_f64())
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn read_quota(&self, guest_id: &str) -> Result<Option<QuotaRow>, StorageError> {
        self.ensure_schema().await?;
        let row = sqlx::query_as::<_, QuotaRow>(READ_QUOTA_SQL)
            .bind(guest_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn store_vault(&self, guest_id: &str, content: &str) -> Result<(), StorageError> {
        self.ensure_schema().await?;
        sqlx::query(STORE_VAULT_SQL)
            .bind(guest_id)
            .bind(content)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_vault(&self, guest_id: &str) -> Result<Option<String>, StorageError> {
        self.ensure_schema().await?;
        let content: Option<(Option<String>,)> = sqlx::query_as(LOAD_VAULT_SQL)
            .bind(guest_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(content.and_then(|(c,)| c))
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
