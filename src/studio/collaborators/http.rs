// SPDX-License-Identifier: MIT

//! HTTP-backed collaborators
//!
//! Every call is a JSON `POST` to `base_url + path`; the response body is the
//! collaborator's result.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::{AssetGenerator, IntentUnderstanding, Publisher, StrategyGenerator, TextGenerator};
use crate::flow::error::{FlowError, Result};
use crate::flow::node::Progress;
use crate::studio::config::CollaboratorConfig;

pub struct HttpCollaborator {
    client: Client,
    config: CollaboratorConfig,
}

impl HttpCollaborator {
    pub fn new(config: CollaboratorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn post(&self, collaborator: &str, path: &str, body: Value) -> Result<Value> {
        let url = self.endpoint(path);
        log::debug!("POST {} for {}", url, collaborator);

        let resp = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| FlowError::collaborator(collaborator, e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(FlowError::collaborator(
                collaborator,
                format!("{} returned {}: {}", url, status, text),
            ));
        }

        resp.json()
            .await
            .map_err(|e| FlowError::collaborator(collaborator, format!("invalid response: {}", e)))
    }
}

#[async_trait]
impl IntentUnderstanding for HttpCollaborator {
    async fn understand(&self, request: &str, context: &Map<String, Value>) -> Result<Value> {
        self.post(
            "intent_understanding",
            &self.config.paths.understand,
            json!({ "request": request, "context": context }),
        )
        .await
    }
}

#[async_trait]
impl StrategyGenerator for HttpCollaborator {
    async fn plan(&self, understanding: &Value) -> Result<Value> {
        self.post(
            "strategy_generation",
            &self.config.paths.strategy,
            json!({ "understanding": understanding }),
        )
        .await
    }
}

#[async_trait]
impl AssetGenerator for HttpCollaborator {
    async fn generate(
        &self,
        strategy: &Value,
        image_count: u32,
        progress: &Progress,
    ) -> Result<Value> {
        progress
            .message(format!("requesting {} images", image_count))
            .await;
        let materials = self
            .post(
                "asset_generation",
                &self.config.paths.material,
                json!({ "strategy": strategy, "count": image_count }),
            )
            .await?;
        if let Some(images) = materials.get("images").and_then(Value::as_array) {
            progress
                .output(json!({ "generated": images.len(), "requested": image_count }))
                .await;
        }
        Ok(materials)
    }
}

#[async_trait]
impl TextGenerator for HttpCollaborator {
    async fn write(&self, strategy: &Value, materials: &Value) -> Result<Value> {
        self.post(
            "text_generation",
            &self.config.paths.content,
            json!({ "strategy": strategy, "materials": materials }),
        )
        .await
    }
}

#[async_trait]
impl Publisher for HttpCollaborator {
    async fn publish(&self, content: &Value, materials: &Value) -> Result<Value> {
        self.post(
            "publishing",
            &self.config.paths.publish,
            json!({ "content": content, "materials": materials }),
        )
        .await
    }
}
