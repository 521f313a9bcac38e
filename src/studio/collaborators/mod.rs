// SPDX-License-Identifier: MIT

//! External collaborators
//!
//! Each trait is consumed by exactly one node. Implementations are
//! constructed once and shared across runs, so they must be `Send + Sync`.

pub mod http;
pub mod storage;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::flow::error::Result;
use crate::flow::node::Progress;
use crate::flow::state::RunSummary;
use crate::studio::config::{StorageKind, StudioConfig};

pub use http::HttpCollaborator;
pub use storage::{JsonlStore, MemoryStore};

/// Turns the raw request into a structured understanding
#[async_trait]
pub trait IntentUnderstanding: Send + Sync {
    async fn understand(&self, request: &str, context: &Map<String, Value>) -> Result<Value>;
}

/// Plans the post from the understanding
#[async_trait]
pub trait StrategyGenerator: Send + Sync {
    async fn plan(&self, understanding: &Value) -> Result<Value>;
}

/// Produces the images (or other assets) for the post
#[async_trait]
pub trait AssetGenerator: Send + Sync {
    /// `progress` may be used to report per-asset progress
    async fn generate(&self, strategy: &Value, image_count: u32, progress: &Progress)
        -> Result<Value>;
}

/// Writes the post text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn write(&self, strategy: &Value, materials: &Value) -> Result<Value>;
}

/// Publishes the finished post to the target platform
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, content: &Value, materials: &Value) -> Result<Value>;
}

/// Persists run summaries
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn save(&self, summary: &RunSummary) -> Result<()>;

    /// Most recent summaries first
    async fn recent(&self, limit: usize) -> Result<Vec<RunSummary>>;
}

/// Everything the graph needs, wired once at startup
#[derive(Clone)]
pub struct Collaborators {
    pub understanding: Arc<dyn IntentUnderstanding>,
    pub strategy: Arc<dyn StrategyGenerator>,
    pub assets: Arc<dyn AssetGenerator>,
    pub text: Arc<dyn TextGenerator>,
    pub publisher: Arc<dyn Publisher>,
    pub store: Arc<dyn ResultStore>,
}

impl Collaborators {
    /// HTTP collaborators plus the configured result store
    pub fn from_config(config: &StudioConfig) -> Result<Self> {
        let http = HttpCollaborator::new(config.collaborators.clone())?;
        let store: Arc<dyn ResultStore> = match config.storage.kind {
            StorageKind::Memory => Arc::new(MemoryStore::new()),
            StorageKind::Jsonl => Arc::new(JsonlStore::new(config.storage.path.clone())),
        };
        log::info!(
            "Collaborators at {} with {:?} storage",
            config.collaborators.base_url,
            config.storage.kind
        );
        Ok(Self::over_http(http, store))
    }

    /// Route every generation call through one HTTP backend
    pub fn over_http(http: HttpCollaborator, store: Arc<dyn ResultStore>) -> Self {
        let http = Arc::new(http);
        Self {
            understanding: http.clone(),
            strategy: http.clone(),
            assets: http.clone(),
            text: http.clone(),
            publisher: http,
            store,
        }
    }
}
