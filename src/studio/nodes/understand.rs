// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::flow::error::Result;
use crate::flow::node::{Node, NodeContext};
use crate::flow::state::{Field, LogLevel, StatePatch, WorkflowState};
use crate::studio::collaborators::IntentUnderstanding;

pub struct UnderstandRequestNode {
    collaborator: Arc<dyn IntentUnderstanding>,
}

impl UnderstandRequestNode {
    pub fn new(collaborator: Arc<dyn IntentUnderstanding>) -> Self {
        Self { collaborator }
    }
}

#[async_trait]
impl Node for UnderstandRequestNode {
    fn name(&self) -> &str {
        super::UNDERSTAND_REQUEST
    }

    fn owns(&self) -> &[Field] {
        &[Field::Understanding]
    }

    async fn execute(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<StatePatch> {
        let understanding = ctx
            .call(
                self.collaborator
                    .understand(state.request(), state.context()),
            )
            .await?;

        Ok(StatePatch::new()
            .set(Field::Understanding, understanding)
            .log(ctx.node(), LogLevel::Info, "request understood")
            .message(ctx.node(), "Understood the request"))
    }
}
