// SPDX-License-Identifier: MIT

//! Built-in nodes of the publishing workflow
//!
//! Each node reads the fields it needs, awaits its single collaborator and
//! writes only the field it owns.

mod content;
mod entry;
mod handle_error;
mod material;
mod publish;
mod record;
mod strategy;
mod understand;

pub use content::GenerateContentNode;
pub use entry::EntryNode;
pub use handle_error::HandleErrorNode;
pub use material::GenerateMaterialNode;
pub use publish::PublishNode;
pub use record::RecordResultNode;
pub use strategy::GenerateStrategyNode;
pub use understand::UnderstandRequestNode;

use crate::flow::state::WorkflowState;

pub const ENTRY: &str = "entry";
pub const UNDERSTAND_REQUEST: &str = "understand_request";
pub const GENERATE_STRATEGY: &str = "generate_strategy";
pub const GENERATE_MATERIAL: &str = "generate_material";
pub const GENERATE_CONTENT: &str = "generate_content";
pub const PUBLISH: &str = "publish";
pub const RECORD_RESULT: &str = "record_result";
pub const HANDLE_ERROR: &str = "handle_error";

/// Happy-path order
pub const PIPELINE: [&str; 7] = [
    ENTRY,
    UNDERSTAND_REQUEST,
    GENERATE_STRATEGY,
    GENERATE_MATERIAL,
    GENERATE_CONTENT,
    PUBLISH,
    RECORD_RESULT,
];

pub const DEFAULT_IMAGE_COUNT: u32 = 3;
pub const MAX_IMAGE_COUNT: u32 = 9;

/// `context.image_count`, defaulted and clamped to 1..=9
pub fn image_count(state: &WorkflowState) -> u32 {
    state
        .context_value("image_count")
        .and_then(|v| v.as_u64())
        .map(|n| n.clamp(1, MAX_IMAGE_COUNT as u64) as u32)
        .unwrap_or(DEFAULT_IMAGE_COUNT)
}

/// `context.should_publish`, true unless explicitly false
pub fn should_publish(state: &WorkflowState) -> bool {
    state
        .context_value("should_publish")
        .and_then(|v| v.as_bool())
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};

    fn with_context(pairs: &[(&str, Value)]) -> WorkflowState {
        let mut ctx = Map::new();
        for (k, v) in pairs {
            ctx.insert(k.to_string(), v.clone());
        }
        WorkflowState::new("u1", "post", ctx)
    }

    #[test]
    fn test_image_count_defaults_and_clamps() {
        assert_eq!(image_count(&with_context(&[])), 3);
        assert_eq!(image_count(&with_context(&[("image_count", json!(5))])), 5);
        assert_eq!(image_count(&with_context(&[("image_count", json!(0))])), 1);
        assert_eq!(image_count(&with_context(&[("image_count", json!(40))])), 9);
        assert_eq!(image_count(&with_context(&[("image_count", json!("many"))])), 3);
    }

    #[test]
    fn test_should_publish_defaults_to_true() {
        assert!(should_publish(&with_context(&[])));
        assert!(!should_publish(&with_context(&[("should_publish", json!(false))])));
    }
}
