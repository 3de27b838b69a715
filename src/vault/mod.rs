// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Uploaded notes vaults
//!
//! An upload replaces the guest's stored vault with the concatenation of its
//! Markdown files. Chat requests without explicit context fall back to it.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::storage::{StorageError, UsageStore};

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("No valid .md files found")]
    NoMarkdownFiles,

    #[error("failed to store vault: {0}")]
    Storage(#[from] StorageError),
}

/// One uploaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl VaultFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn is_markdown(&self) -> bool {
        self.name.to_ascii_lowercase().ends_with(".md")
    }
}

/// Concatenate the Markdown files, each under a `--- name ---` header.
///
/// Returns the content and the number of files included.
pub fn concatenate(files: &[VaultFile]) -> (String, usize) {
    files
        .iter()
        .filter(|f| f.is_markdown())
        .fold((String::new(), 0), |(mut content, count), file| {
            content.push_str("\n--- ");
            content.push_str(&file.name);
            content.push_str(" ---\n");
            content.push_str(&String::from_utf8_lossy(&file.bytes));
            (content, count + 1)
        })
}

#[derive(Clone)]
pub struct VaultStore {
    store: Arc<dyn UsageStore>,
}

impl VaultStore {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self { store }
    }

    /// Replace the guest's vault with the Markdown files in `files`.
    ///
    /// Returns the number of Markdown files stored.
    pub async fn save(&self, guest_id: &str, files: &[VaultFile]) -> Result<usize, VaultError> {
        let (content, count) = concatenate(files);
        if count == 0 {
            return Err(VaultError::NoMarkdownFiles);
        }

        self.store.store_vault(guest_id, &content).await?;
        info!(
            "Stored vault for guest {} ({} files, {} bytes)",
            guest_id,
            count,
            content.len()
        );
        Ok(count)
    }

    /// Stored vault content, or `None` when absent or unreadable
    pub async fn load(&self, guest_id: &str) -> Option<String> {
        match self.store.load_vault(guest_id).await {
            Ok(content) => content.filter(|c| !c.is_empty()),
            Err(e) => {
                warn!("Could not load vault for guest {}: {}", guest_id, e);
                None
            }
        }
    }
}
