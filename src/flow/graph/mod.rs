// SPDX-License-Identifier: MIT

//! Directed graph of nodes and the executor that walks it

pub mod builder;
pub mod executor;
pub mod types;

pub use builder::GraphBuilder;
pub use executor::{GraphExecutor, DEFAULT_MAX_ITERATIONS};
pub use types::{Condition, Edge, GraphDefinition, Next, NodeSpec};
