// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::flow::error::Result;
use crate::flow::node::{Node, NodeContext};
use crate::flow::state::{Field, LogLevel, StatePatch, WorkflowState};
use crate::studio::collaborators::TextGenerator;

pub struct GenerateContentNode {
    collaborator: Arc<dyn TextGenerator>,
}

impl GenerateContentNode {
    pub fn new(collaborator: Arc<dyn TextGenerator>) -> Self {
        Self { collaborator }
    }
}

#[async_trait]
impl Node for GenerateContentNode {
    fn name(&self) -> &str {
        super::GENERATE_CONTENT
    }

    fn owns(&self) -> &[Field] {
        &[Field::ContentResult]
    }

    async fn execute(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<StatePatch> {
        let strategy = state.require(Field::Strategy)?;
        let materials = state.require(Field::Materials)?;
        let content = ctx.call(self.collaborator.write(strategy, materials)).await?;

        Ok(StatePatch::new()
            .set(Field::ContentResult, content)
            .log(ctx.node(), LogLevel::Info, "content generated")
            .message(ctx.node(), "Wrote the post"))
    }
}
