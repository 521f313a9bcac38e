// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::flow::error::Result;
use crate::flow::node::{Node, NodeContext};
use crate::flow::state::{Field, LogLevel, StatePatch, WorkflowState};
use crate::studio::collaborators::AssetGenerator;

/// Generates the post images; usually the slowest stage
pub struct GenerateMaterialNode {
    collaborator: Arc<dyn AssetGenerator>,
}

impl GenerateMaterialNode {
    pub fn new(collaborator: Arc<dyn AssetGenerator>) -> Self {
        Self { collaborator }
    }
}

#[async_trait]
impl Node for GenerateMaterialNode {
    fn name(&self) -> &str {
        super::GENERATE_MATERIAL
    }

    fn owns(&self) -> &[Field] {
        &[Field::Materials]
    }

    async fn execute(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<StatePatch> {
        let strategy = state.require(Field::Strategy)?;
        let count = super::image_count(state);

        ctx.progress()
            .message(format!("Generating {} images", count))
            .await;
        let materials = ctx
            .call(self.collaborator.generate(strategy, count, ctx.progress()))
            .await?;

        Ok(StatePatch::new()
            .set(Field::Materials, materials)
            .log(
                ctx.node(),
                LogLevel::Info,
                format!("{} images requested", count),
            )
            .message(ctx.node(), "Images ready"))
    }
}
