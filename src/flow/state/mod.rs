// SPDX-License-Identifier: MIT

//! State management for workflow runs
//!
//! This module provides:
//! - `WorkflowState` - the typed record threaded through every node
//! - `StatePatch` - the partial update a node returns
//! - `Field` - the ownership unit checked when a patch is merged

mod patch;
mod schema;
mod store;

pub use patch::StatePatch;
pub use schema::{Field, LogEntry, LogLevel, Message, RunStatus};
pub use store::{RunSummary, WorkflowState};
