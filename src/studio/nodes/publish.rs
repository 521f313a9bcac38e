// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::flow::error::Result;
use crate::flow::node::{Node, NodeContext};
use crate::flow::state::{Field, LogLevel, StatePatch, WorkflowState};
use crate::studio::collaborators::Publisher;

/// Publishes the post, or records a skip when `should_publish` is false
pub struct PublishNode {
    collaborator: Arc<dyn Publisher>,
}

impl PublishNode {
    pub fn new(collaborator: Arc<dyn Publisher>) -> Self {
        Self { collaborator }
    }
}

#[async_trait]
impl Node for PublishNode {
    fn name(&self) -> &str {
        super::PUBLISH
    }

    fn owns(&self) -> &[Field] {
        &[Field::PublishResult]
    }

    async fn execute(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<StatePatch> {
        let content = state.require(Field::ContentResult)?;
        let materials = state.require(Field::Materials)?;

        if !super::should_publish(state) {
            log::info!("Skipping publish for run {} (should_publish=false)", state.run_id());
            return Ok(StatePatch::new()
                .set(Field::PublishResult, json!({ "skipped": true }))
                .log(ctx.node(), LogLevel::Info, "publish skipped by request")
                .message(ctx.node(), "Publishing skipped"));
        }

        let result = ctx
            .call(self.collaborator.publish(content, materials))
            .await?;

        Ok(StatePatch::new()
            .set(Field::PublishResult, result)
            .log(ctx.node(), LogLevel::Info, "post published")
            .message(ctx.node(), "Published the post"))
    }
}
