// SPDX-License-Identifier: MIT

//! Content publishing workflow built on [`crate::flow`]

pub mod collaborators;
pub mod config;
pub mod nodes;
pub mod server;
pub mod workflow;

pub use config::{ConfigLoader, StudioConfig};
pub use workflow::{build_graph, Engine, RunRequest, StreamingRun};
