// SPDX-License-Identifier: MIT

//! Progress events and the translator that produces them
//!
//! The executor reports its per-node lifecycle to a [`RunObserver`].
//! [`EventTranslator`] is the observer that turns that lifecycle into the
//! ordered [`StreamEvent`] feed a client subscribes to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

use crate::flow::error::ErrorInfo;
use crate::flow::state::{RunStatus, WorkflowState};
use crate::flow::transport::EventSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Started,
    NodeStart,
    NodeOutput,
    NodeEnd,
    Message,
    Error,
    Completed,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Started => "started",
            EventType::NodeStart => "node_start",
            EventType::NodeOutput => "node_output",
            EventType::NodeEnd => "node_end",
            EventType::Message => "message",
            EventType::Error => "error",
            EventType::Completed => "completed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of the progress feed. Never mutated once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub node: Option<String>,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl StreamEvent {
    fn new(kind: EventType, node: Option<&str>, payload: Value) -> Self {
        Self {
            kind,
            node: node.map(str::to_string),
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn started(state: &WorkflowState) -> Self {
        Self::new(
            EventType::Started,
            None,
            json!({
                "run_id": state.run_id(),
                "user_id": state.user_id(),
                "request": state.request(),
                "context": state.context(),
            }),
        )
    }

    pub fn node_start(node: &str) -> Self {
        Self::new(EventType::NodeStart, Some(node), json!({ "node": node }))
    }

    pub fn node_output(node: &str, payload: Value) -> Self {
        Self::new(EventType::NodeOutput, Some(node), payload)
    }

    pub fn message(node: &str, content: &str) -> Self {
        Self::new(EventType::Message, Some(node), json!({ "content": content }))
    }

    pub fn node_end(node: &str, success: bool, elapsed: Duration) -> Self {
        Self::new(
            EventType::NodeEnd,
            Some(node),
            json!({
                "node": node,
                "success": success,
                "duration_ms": elapsed.as_millis() as u64,
            }),
        )
    }

    pub fn error(info: &ErrorInfo) -> Self {
        Self::new(
            EventType::Error,
            Some(&info.node),
            serde_json::to_value(info).unwrap_or(Value::Null),
        )
    }

    pub fn completed(state: &WorkflowState) -> Self {
        Self::new(
            EventType::Completed,
            None,
            json!({
                "run_id": state.run_id(),
                "status": state.status(),
            }),
        )
    }

    /// One JSON document per line
    pub fn to_json_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }
}

/// Callbacks invoked by the executor around each node
#[async_trait]
pub trait RunObserver: Send + Sync {
    async fn run_started(&self, _state: &WorkflowState) {}
    async fn node_started(&self, _node: &str) {}
    async fn node_finished(&self, _node: &str, _success: bool, _elapsed: Duration) {}
    async fn run_finished(&self, _state: &WorkflowState) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Turns the executor lifecycle into stream events
pub struct EventTranslator {
    sink: EventSink,
}

impl EventTranslator {
    pub fn new(sink: EventSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl RunObserver for EventTranslator {
    async fn run_started(&self, state: &WorkflowState) {
        self.sink.emit(StreamEvent::started(state)).await;
    }

    async fn node_started(&self, node: &str) {
        self.sink.emit(StreamEvent::node_start(node)).await;
    }

    async fn node_finished(&self, node: &str, success: bool, elapsed: Duration) {
        self.sink
            .emit(StreamEvent::node_end(node, success, elapsed))
            .await;
    }

    async fn run_finished(&self, state: &WorkflowState) {
        if state.status() == RunStatus::Failed {
            if let Some(info) = state.error() {
                self.sink.emit(StreamEvent::error(info)).await;
            }
        }
        self.sink.emit(StreamEvent::completed(state)).await;
    }
}
