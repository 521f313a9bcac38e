// SPDX-License-Identifier: MIT

//! Node contract
//!
//! A node reads the shared [`WorkflowState`], does its work (usually by
//! awaiting one external collaborator) and answers with a [`StatePatch`]
//! restricted to the fields it [`owns`](Node::owns).

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::flow::error::{ErrorInfo, FlowError, Result};
use crate::flow::events::StreamEvent;
use crate::flow::state::{Field, StatePatch, WorkflowState};
use crate::flow::transport::EventSink;

/// Core trait for all workflow stages
#[async_trait]
pub trait Node: Send + Sync {
    /// Returns the node name (unique within a graph)
    fn name(&self) -> &str;

    /// Fields this node is allowed to write
    fn owns(&self) -> &[Field] {
        &[]
    }

    /// Run the stage against a read-only view of the state
    async fn execute(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<StatePatch>;
}

/// Emits intermediate `node_output` / `message` events for one node
#[derive(Clone)]
pub struct Progress {
    node: String,
    sink: EventSink,
}

impl Progress {
    pub fn new(node: impl Into<String>, sink: EventSink) -> Self {
        Self {
            node: node.into(),
            sink,
        }
    }

    /// Progress handle that discards everything
    pub fn detached(node: impl Into<String>) -> Self {
        Self::new(node, EventSink::disabled())
    }

    pub async fn output(&self, payload: Value) {
        self.sink
            .emit(StreamEvent::node_output(&self.node, payload))
            .await;
    }

    pub async fn message(&self, content: impl AsRef<str>) {
        self.sink
            .emit(StreamEvent::message(&self.node, content.as_ref()))
            .await;
    }
}

/// Per-invocation context handed to a node
#[derive(Clone)]
pub struct NodeContext {
    node: String,
    run_id: String,
    cancel: CancellationToken,
    failure: Option<ErrorInfo>,
    progress: Progress,
}

impl NodeContext {
    pub fn new(
        node: impl Into<String>,
        run_id: impl Into<String>,
        cancel: CancellationToken,
        sink: EventSink,
    ) -> Self {
        let node = node.into();
        Self {
            progress: Progress::new(node.clone(), sink),
            node,
            run_id: run_id.into(),
            cancel,
            failure: None,
        }
    }

    /// Context with no subscriber and a fresh cancellation token
    pub fn detached(node: impl Into<String>) -> Self {
        Self::new(node, "", CancellationToken::new(), EventSink::disabled())
    }

    /// Attach the failure the error node is recovering from
    pub fn with_failure(mut self, failure: ErrorInfo) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn failure(&self) -> Option<&ErrorInfo> {
        self.failure.as_ref()
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Start a collaborator call unless the run is already cancelled
    ///
    /// Once started, the call runs to completion and its result is kept:
    /// the side effect has already happened. The executor stops the run
    /// before the next node.
    pub async fn call<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        self.checkpoint()?;
        call.await
    }

    /// Resolves once the run is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Safe point: fail with `Cancelled` if the client went away
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            log::info!("Node {} observed cancellation", self.node);
            Err(FlowError::Cancelled)
        } else {
            Ok(())
        }
    }
}
