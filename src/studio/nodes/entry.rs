// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::flow::error::{FlowError, Result};
use crate::flow::node::{Node, NodeContext};
use crate::flow::state::{LogLevel, StatePatch, WorkflowState};

/// Validates the identity fields and opens the audit trail
pub struct EntryNode;

#[async_trait]
impl Node for EntryNode {
    fn name(&self) -> &str {
        super::ENTRY
    }

    async fn execute(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<StatePatch> {
        if state.user_id().trim().is_empty() {
            return Err(FlowError::InvalidInput("user_id is empty".to_string()));
        }
        if state.request().trim().is_empty() {
            return Err(FlowError::InvalidInput("request is empty".to_string()));
        }
        if let Some(count) = state.context_value("image_count") {
            if !count.is_u64() {
                return Err(FlowError::InvalidInput(format!(
                    "image_count must be a non-negative integer, got {}",
                    count
                )));
            }
        }

        Ok(StatePatch::new()
            .log(
                ctx.node(),
                LogLevel::Info,
                format!("run {} accepted for user {}", state.run_id(), state.user_id()),
            )
            .message(ctx.node(), format!("Received request: {}", state.request())))
    }
}
