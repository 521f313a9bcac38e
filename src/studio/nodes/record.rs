// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::flow::error::Result;
use crate::flow::node::{Node, NodeContext};
use crate::flow::state::{Field, LogLevel, RunStatus, StatePatch, WorkflowState};
use crate::studio::collaborators::ResultStore;

/// Persists the run summary and closes the run successfully
pub struct RecordResultNode {
    store: Arc<dyn ResultStore>,
}

impl RecordResultNode {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Node for RecordResultNode {
    fn name(&self) -> &str {
        super::RECORD_RESULT
    }

    fn owns(&self) -> &[Field] {
        &[Field::Status]
    }

    async fn execute(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<StatePatch> {
        let mut summary = state.summary();
        summary.status = RunStatus::Success;
        ctx.call(self.store.save(&summary)).await?;

        Ok(StatePatch::new()
            .status(RunStatus::Success)
            .log(ctx.node(), LogLevel::Info, "run summary stored")
            .message(ctx.node(), "Run complete"))
    }
}
