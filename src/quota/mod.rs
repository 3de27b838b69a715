// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Long-horizon guest quota
//!
//! In count mode every guest gets a fixed lifetime number of chat requests.
//! In window mode the counter restarts once the window expires; window mode
//! reports the time left but never blocks.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::QuotaMode;
use crate::storage::{QuotaRow, StorageError, UsageStore};

/// Message returned when a guest has used up a count-mode quota
pub const QUOTA_EXCEEDED_MESSAGE: &str =
    "Free tier quota exceeded. Please sign up for an account or contact support to continue.";

/// Message attached to usage reports when the quota could not be read
pub const QUOTA_UNAVAILABLE_WARNING: &str = "Usage data is temporarily unavailable";

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("quota store unavailable: {0}")]
    Unavailable(#[from] StorageError),
}

/// Quota block reported to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaStatus {
    #[serde(rename = "type")]
    pub holder: &'static str,
    #[serde(flatten)]
    pub usage: QuotaUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum QuotaUsage {
    Count {
        total: u32,
        used: u32,
        remaining: u32,
    },
    #[serde(rename_all = "camelCase")]
    Window {
        window_minutes: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        window_remaining_seconds: Option<u64>,
        used: u32,
    },
}

impl QuotaStatus {
    fn guest(usage: QuotaUsage) -> Self {
        Self {
            holder: "guest",
            usage,
        }
    }

    pub fn used(&self) -> u32 {
        match self.usage {
            QuotaUsage::Count { used, .. } | QuotaUsage::Window { used, .. } => used,
        }
    }
}

/// Result of recording one chat request against the quota
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaOutcome {
    pub allowed: bool,
    pub status: QuotaStatus,
}

/// Whole seconds left in a window, never negative
pub fn window_remaining_secs(window: Duration, elapsed_secs: f64) -> u64 {
    (window.as_secs_f64() - elapsed_secs).max(0.0).ceil() as u64
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Count { total: u32 },
    Window { minutes: u32, length: Duration },
}

/// Guest quota enforcement and reporting
#[derive(Clone)]
pub struct QuotaLedger {
    store: Arc<dyn UsageStore>,
    mode: Mode,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn UsageStore>, mode: QuotaMode) -> Self {
        let mode = match mode {
            QuotaMode::Count { total } => Mode::Count { total },
            QuotaMode::Window { minutes } => Mode::Window {
                minutes,
                length: Duration::from_secs(u64::from(minutes) * 60),
            },
        };
        Self { store, mode }
    }

    /// Window mode with an arbitrary window length, for tests
    pub fn with_window(store: Arc<dyn UsageStore>, window: Duration) -> Self {
        let minutes = (window.as_secs() / 60) as u32;
        Self {
            store,
            mode: Mode::Window {
                minutes,
                length: window,
            },
        }
    }

    /// Count one chat request for `guest_id` and decide whether it may proceed.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::Unavailable`] when the store cannot be updated;
    /// the chat path must then refuse the request.
    pub async fn record_and_check(&self, guest_id: &str) -> Result<QuotaOutcome, QuotaError> {
        match self.mode {
            Mode::Count { total } => {
                let row = self.store.record_count(guest_id).await?;
                let used = clamp_count(row.requests_made);
                let allowed = used <= total;
                if !allowed {
                    warn!("Guest {} exceeded free quota ({}/{})", guest_id, used, total);
                }
                Ok(QuotaOutcome {
                    allowed,
                    status: count_status(total, used),
                })
            }
            Mode::Window { minutes, length } => {
                let row = self.store.record_window(guest_id, length).await?;
                debug!(
                    "Guest {} at {} requests in current window",
                    guest_id, row.requests_made
                );
                Ok(QuotaOutcome {
                    allowed: true,
                    status: window_status(minutes, length, Some(row)),
                })
            }
        }
    }

    /// Current quota without counting a request.
    ///
    /// Degrades to the default view plus a warning when the store is
    /// unreachable.
    pub async fn snapshot(&self, guest_id: &str) -> (QuotaStatus, Option<String>) {
        let row = match self.store.read_quota(guest_id).await {
            Ok(row) => row,
            Err(e) => {
                warn!("Could not read quota for guest {}: {}", guest_id, e);
                return (
                    self.default_status(),
                    Some(QUOTA_UNAVAILABLE_WARNING.to_string()),
                );
            }
        };

        let status = match self.mode {
            Mode::Count { total } => {
                count_status(total, row.map(|r| clamp_count(r.requests_made)).unwrap_or(0))
            }
            Mode::Window { minutes, length } => {
                // an expired window reports as a fresh one
                let row = row.filter(|r| r.elapsed_secs <= length.as_secs_f64());
                window_status(minutes, length, row)
            }
        };
        (status, None)
    }

    fn default_status(&self) -> QuotaStatus {
        match self.mode {
            Mode::Count { total } => count_status(total, 0),
            Mode::Window { minutes, .. } => QuotaStatus::guest(QuotaUsage::Window {
                window_minutes: minutes,
                window_remaining_seconds: None,
                used: 0,
            }),
        }
    }
}

fn clamp_count(requests_made: i64) -> u32 {
    requests_made.clamp(0, i64::from(u32::MAX)) as u32
}

fn count_status(total: u32, used: u32) -> QuotaStatus {
    QuotaStatus::guest(QuotaUsage::Count {
        total,
        used,
        remaining: total.saturating_sub(used),
    })
}

fn window_status(minutes: u32, length: Duration, row: Option<QuotaRow>) -> QuotaStatus {
    let (used, remaining) = match row {
        Some(row) => (
            clamp_count(row.requests_made),
            window_remaining_secs(length, row.elapsed_secs),
        ),
        None => (0, length.as_secs()),
    };
    QuotaStatus::guest(QuotaUsage::Window {
        window_minutes: minutes,
        window_remaining_seconds: Some(remaining),
        used,
    })
}
