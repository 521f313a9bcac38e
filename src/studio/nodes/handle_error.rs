// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::flow::error::{FlowError, Result};
use crate::flow::node::{Node, NodeContext};
use crate::flow::state::{Field, LogLevel, RunStatus, StatePatch, WorkflowState};

/// Records the routed failure and closes the run as failed
pub struct HandleErrorNode;

#[async_trait]
impl Node for HandleErrorNode {
    fn name(&self) -> &str {
        super::HANDLE_ERROR
    }

    fn owns(&self) -> &[Field] {
        &[Field::Error, Field::Status]
    }

    async fn execute(&self, _state: &WorkflowState, ctx: &NodeContext) -> Result<StatePatch> {
        let failure = ctx
            .failure()
            .cloned()
            .ok_or_else(|| FlowError::invariant("error node invoked without a failure"))?;

        let summary = format!("{} failed: {}", failure.node, failure.message);
        Ok(StatePatch::new()
            .log(ctx.node(), LogLevel::Error, summary.clone())
            .message(ctx.node(), summary)
            .error(failure)
            .status(RunStatus::Failed))
    }
}
