// SPDX-License-Identifier: MIT

//! Result storage backends

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use super::ResultStore;
use crate::flow::error::Result;
use crate::flow::state::RunSummary;

/// Keeps summaries in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<Vec<RunSummary>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn save(&self, summary: &RunSummary) -> Result<()> {
        self.entries.write().await.push(summary.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<RunSummary>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}

/// Appends one JSON document per summary to a file
pub struct JsonlStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultStore for JsonlStore {
    async fn save(&self, summary: &RunSummary) -> Result<()> {
        let mut line = serde_json::to_string(summary)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        log::debug!("Stored summary of run {} in {}", summary.run_id, self.path.display());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<RunSummary>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut summaries = Vec::new();
        for line in content.lines().rev() {
            if summaries.len() >= limit {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RunSummary>(line) {
                Ok(summary) => summaries.push(summary),
                Err(e) => log::warn!("Skipping unreadable line in {}: {}", self.path.display(), e),
            }
        }
        Ok(summaries)
    }
}
