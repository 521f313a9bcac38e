// SPDX-License-Identifier: MIT

//! Graph builder - validates wiring before a definition is handed out

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use super::types::{Edge, GraphDefinition, Next, NodeSpec};
use crate::flow::error::{FlowError, Result};
use crate::flow::node::Node;
use crate::flow::state::WorkflowState;

/// Collects nodes and edges, then produces an immutable `GraphDefinition`
pub struct GraphBuilder {
    name: String,
    nodes: Vec<NodeSpec>,
    edges: Vec<(String, Edge)>,
    entry: Option<String>,
    error_node: Option<String>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            entry: None,
            error_node: None,
        }
    }

    pub fn node(mut self, node: Arc<dyn Node>) -> Self {
        self.nodes.push(NodeSpec {
            node,
            timeout: None,
        });
        self
    }

    pub fn node_with_timeout(mut self, node: Arc<dyn Node>, timeout: Duration) -> Self {
        self.nodes.push(NodeSpec {
            node,
            timeout: Some(timeout),
        });
        self
    }

    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    pub fn error_node(mut self, name: impl Into<String>) -> Self {
        self.error_node = Some(name.into());
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), Edge::To(to.into())));
        self
    }

    pub fn terminal(mut self, from: impl Into<String>) -> Self {
        self.edges.push((from.into(), Edge::Terminal));
        self
    }

    /// Route from the state after `from` succeeds
    ///
    /// Targets are only known at run time. The executor treats an unknown
    /// target, or the error node itself, as an invariant violation.
    pub fn conditional<F>(mut self, from: impl Into<String>, route: F) -> Self
    where
        F: Fn(&WorkflowState) -> Next + Send + Sync + 'static,
    {
        self.edges.push((from.into(), Edge::When(Arc::new(route))));
        self
    }

    /// Chain `names` with unconditional edges
    pub fn chain(mut self, names: &[&str]) -> Self {
        for pair in names.windows(2) {
            self.edges
                .push((pair[0].to_string(), Edge::To(pair[1].to_string())));
        }
        self
    }

    pub fn build(self) -> Result<GraphDefinition> {
        let mut nodes = HashMap::new();
        let mut order = Vec::with_capacity(self.nodes.len());
        for spec in self.nodes {
            let name = spec.node.name().to_string();
            if nodes.contains_key(&name) {
                return Err(FlowError::config(format!("duplicate node '{}'", name)));
            }
            order.push(name.clone());
            nodes.insert(name, spec);
        }

        let entry = self
            .entry
            .ok_or_else(|| FlowError::config("graph has no entry node"))?;
        if !nodes.contains_key(&entry) {
            return Err(FlowError::config(format!(
                "entry node '{}' is not registered",
                entry
            )));
        }

        let error_node = self
            .error_node
            .ok_or_else(|| FlowError::config("graph has no error node"))?;
        if !nodes.contains_key(&error_node) {
            return Err(FlowError::config(format!(
                "error node '{}' is not registered",
                error_node
            )));
        }

        let mut edges = HashMap::new();
        for (from, edge) in self.edges {
            if !nodes.contains_key(&from) {
                return Err(FlowError::config(format!(
                    "edge starts at unknown node '{}'",
                    from
                )));
            }
            if let Edge::To(target) = &edge {
                if !nodes.contains_key(target) {
                    return Err(FlowError::config(format!(
                        "edge '{}' -> '{}' targets an unknown node",
                        from, target
                    )));
                }
                if *target == error_node {
                    return Err(FlowError::config(format!(
                        "'{}' routes to the error node directly; failures reach it implicitly",
                        from
                    )));
                }
            }
            if edges.insert(from.clone(), edge).is_some() {
                return Err(FlowError::config(format!(
                    "node '{}' has more than one outgoing edge",
                    from
                )));
            }
        }

        let missing: Vec<&String> = order.iter().filter(|n| !edges.contains_key(*n)).collect();
        if !missing.is_empty() {
            return Err(FlowError::config(format!(
                "nodes without an outgoing edge: {:?}",
                missing
            )));
        }

        if !matches!(edges.get(&error_node), Some(Edge::Terminal)) {
            return Err(FlowError::config(format!(
                "error node '{}' must be terminal",
                error_node
            )));
        }

        let reachable = reachable_from(&entry, &edges);
        for name in &order {
            if name != &error_node && !reachable.contains(name.as_str()) {
                log::warn!("Node '{}' is not reachable from '{}'", name, entry);
            }
        }

        log::info!(
            "Built graph '{}' with {} nodes (entry: {}, error: {})",
            self.name,
            order.len(),
            entry,
            error_node
        );

        Ok(GraphDefinition {
            name: self.name,
            nodes,
            order,
            edges,
            entry,
            error_node,
        })
    }
}

/// Follow static edges from `start`; conditional edges end the walk
fn reachable_from<'a>(start: &'a str, edges: &'a HashMap<String, Edge>) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    let mut current = Some(start);
    while let Some(name) = current {
        if !seen.insert(name) {
            break;
        }
        current = match edges.get(name) {
            Some(Edge::To(target)) => Some(target.as_str()),
            _ => None,
        };
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::node::NodeContext;
    use crate::flow::state::StatePatch;
    use async_trait::async_trait;
    use serde_json::Map;

    struct Named(&'static str);

    #[async_trait]
    impl Node for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn execute(&self, _state: &WorkflowState, _ctx: &NodeContext) -> Result<StatePatch> {
            Ok(StatePatch::new())
        }
    }

    fn base() -> GraphBuilder {
        GraphBuilder::new("test")
            .node(Arc::new(Named("a")))
            .node(Arc::new(Named("b")))
            .node(Arc::new(Named("oops")))
            .entry("a")
            .error_node("oops")
            .terminal("oops")
    }

    #[test]
    fn test_build_linear_graph() {
        let graph = base().chain(&["a", "b"]).terminal("b").build().unwrap();
        let state = WorkflowState::new("u", "r", Map::new());

        assert_eq!(graph.entry(), "a");
        assert_eq!(graph.error_node(), "oops");
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.next("a", &state), Next::Node("b".into()));
        assert_eq!(graph.next("b", &state), Next::Terminal);
        assert!(graph.is_terminal("oops"));
    }

    #[test]
    fn test_conditional_edge_reads_state() {
        let graph = base()
            .conditional("a", |state| {
                if state.request().contains("skip") {
                    Next::Terminal
                } else {
                    Next::Node("b".into())
                }
            })
            .terminal("b")
            .build()
            .unwrap();

        let go = WorkflowState::new("u", "go", Map::new());
        let skip = WorkflowState::new("u", "skip it", Map::new());
        assert_eq!(graph.next("a", &go), Next::Node("b".into()));
        assert_eq!(graph.next("a", &skip), Next::Terminal);
    }

    #[test]
    fn test_missing_entry_is_rejected() {
        let err = GraphBuilder::new("x")
            .node(Arc::new(Named("oops")))
            .error_node("oops")
            .terminal("oops")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("no entry node"));
    }

    #[test]
    fn test_unknown_target_is_rejected() {
        let err = base().edge("a", "nowhere").terminal("b").build().unwrap_err();
        assert!(err.to_string().contains("unknown node"));
    }

    #[test]
    fn test_node_without_edge_is_rejected() {
        let err = base().terminal("a").build().unwrap_err();
        assert!(err.to_string().contains("without an outgoing edge"));
    }

    #[test]
    fn test_error_node_must_be_terminal() {
        let err = GraphBuilder::new("x")
            .node(Arc::new(Named("a")))
            .node(Arc::new(Named("oops")))
            .entry("a")
            .error_node("oops")
            .terminal("a")
            .conditional("oops", |_| Next::Terminal)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("must be terminal"));
    }

    #[test]
    fn test_duplicate_node_is_rejected() {
        let err = base()
            .node(Arc::new(Named("a")))
            .chain(&["a", "b"])
            .terminal("b")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate node"));
    }

    #[test]
    fn test_explicit_edge_to_error_node_is_rejected() {
        let err = base().edge("a", "oops").terminal("b").build().unwrap_err();
        assert!(err.to_string().contains("error node directly"));
    }
}
