// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::flow::error::Result;
use crate::flow::node::{Node, NodeContext};
use crate::flow::state::{Field, LogLevel, StatePatch, WorkflowState};
use crate::studio::collaborators::StrategyGenerator;

pub struct GenerateStrategyNode {
    collaborator: Arc<dyn StrategyGenerator>,
}

impl GenerateStrategyNode {
    pub fn new(collaborator: Arc<dyn StrategyGenerator>) -> Self {
        Self { collaborator }
    }
}

#[async_trait]
impl Node for GenerateStrategyNode {
    fn name(&self) -> &str {
        super::GENERATE_STRATEGY
    }

    fn owns(&self) -> &[Field] {
        &[Field::Strategy]
    }

    async fn execute(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<StatePatch> {
        let understanding = state.require(Field::Understanding)?;
        let strategy = ctx.call(self.collaborator.plan(understanding)).await?;

        Ok(StatePatch::new()
            .set(Field::Strategy, strategy)
            .log(ctx.node(), LogLevel::Info, "strategy generated")
            .message(ctx.node(), "Planned the post"))
    }
}
