// SPDX-License-Identifier: MIT

//! Graph definition types
//!
//! A [`GraphDefinition`] is built once at startup and shared read-only by
//! every run.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::flow::node::Node;
use crate::flow::state::WorkflowState;

/// Routing decision after a node succeeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Node(String),
    Terminal,
}

/// Routing closure for conditional edges
pub type Condition = Arc<dyn Fn(&WorkflowState) -> Next + Send + Sync>;

/// Outgoing edge of a node
#[derive(Clone)]
pub enum Edge {
    /// Unconditional advance
    To(String),
    /// Run ends after this node
    Terminal,
    /// Decided from the state after the node ran
    When(Condition),
}

impl Edge {
    pub fn resolve(&self, state: &WorkflowState) -> Next {
        match self {
            Edge::To(target) => Next::Node(target.clone()),
            Edge::Terminal => Next::Terminal,
            Edge::When(condition) => condition(state),
        }
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::To(target) => f.debug_tuple("To").field(target).finish(),
            Edge::Terminal => f.write_str("Terminal"),
            Edge::When(_) => f.write_str("When(..)"),
        }
    }
}

/// Registered node plus its invocation bound
#[derive(Clone)]
pub struct NodeSpec {
    pub node: Arc<dyn Node>,
    pub timeout: Option<Duration>,
}

/// Immutable set of nodes plus routing rules
pub struct GraphDefinition {
    pub(crate) name: String,
    pub(crate) nodes: HashMap<String, NodeSpec>,
    pub(crate) order: Vec<String>,
    pub(crate) edges: HashMap<String, Edge>,
    pub(crate) entry: String,
    pub(crate) error_node: String,
}

impl GraphDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// The single recovery node every failure jumps to
    pub fn error_node(&self) -> &str {
        &self.error_node
    }

    pub fn node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.get(name)
    }

    /// Node names in registration order
    pub fn node_names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Pick the node that follows `current`
    pub fn next(&self, current: &str, state: &WorkflowState) -> Next {
        match self.edges.get(current) {
            Some(edge) => edge.resolve(state),
            None => Next::Terminal,
        }
    }

    pub fn is_terminal(&self, name: &str) -> bool {
        matches!(self.edges.get(name), Some(Edge::Terminal))
    }
}

impl fmt::Debug for GraphDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphDefinition")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("edges", &self.edges)
            .field("entry", &self.entry)
            .field("error_node", &self.error_node)
            .finish()
    }
}
