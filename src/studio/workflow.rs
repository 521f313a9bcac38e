// SPDX-License-Identifier: MIT

//! Publishing workflow graph and the engine that runs it

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::flow::error::Result;
use crate::flow::events::{EventTranslator, NoopObserver};
use crate::flow::graph::{GraphBuilder, GraphDefinition, GraphExecutor};
use crate::flow::node::Node;
use crate::flow::retry::RetryingNode;
use crate::flow::state::WorkflowState;
use crate::flow::transport::{self, EventSink, RunStream};
use crate::studio::collaborators::Collaborators;
use crate::studio::config::{EngineConfig, StudioConfig};
use crate::studio::nodes::{self, *};

/// Inbound trigger payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub user_id: String,
    pub request: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl RunRequest {
    pub fn new(user_id: impl Into<String>, request: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            request: request.into(),
            context: Map::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    fn into_state(self) -> WorkflowState {
        WorkflowState::new(self.user_id, self.request, self.context)
    }
}

/// Wire the eight nodes into the publishing graph
pub fn build_graph(collaborators: &Collaborators, config: &StudioConfig) -> Result<GraphDefinition> {
    let stages: Vec<Arc<dyn Node>> = vec![
        Arc::new(EntryNode),
        Arc::new(UnderstandRequestNode::new(
            collaborators.understanding.clone(),
        )),
        Arc::new(GenerateStrategyNode::new(collaborators.strategy.clone())),
        Arc::new(GenerateMaterialNode::new(collaborators.assets.clone())),
        Arc::new(GenerateContentNode::new(collaborators.text.clone())),
        Arc::new(PublishNode::new(collaborators.publisher.clone())),
        Arc::new(RecordResultNode::new(collaborators.store.clone())),
        Arc::new(HandleErrorNode),
    ];

    let mut builder = GraphBuilder::new("publish_post");
    for stage in stages {
        let name = stage.name().to_string();
        let stage = RetryingNode::wrap(stage, config.node_retry(&name));
        builder = match config.node_timeout(&name) {
            Some(timeout) => builder.node_with_timeout(stage, timeout),
            None => builder.node(stage),
        };
    }

    builder
        .entry(nodes::ENTRY)
        .error_node(nodes::HANDLE_ERROR)
        .chain(&nodes::PIPELINE)
        .terminal(nodes::RECORD_RESULT)
        .terminal(nodes::HANDLE_ERROR)
        .build()
}

/// A streaming run: ordered events plus the final state
pub struct StreamingRun {
    pub events: RunStream,
    pub outcome: JoinHandle<WorkflowState>,
}

/// Shares one immutable graph across concurrent runs
#[derive(Clone)]
pub struct Engine {
    executor: GraphExecutor,
    collaborators: Collaborators,
    config: EngineConfig,
}

impl Engine {
    pub fn new(collaborators: Collaborators, config: &StudioConfig) -> Result<Self> {
        let graph = build_graph(&collaborators, config)?;
        let executor = GraphExecutor::new(Arc::new(graph))
            .with_max_iterations(config.engine.max_iterations);
        Ok(Self {
            executor,
            collaborators,
            config: config.engine.clone(),
        })
    }

    pub fn graph(&self) -> &GraphDefinition {
        self.executor.graph()
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Run to completion without a subscriber
    pub async fn run(&self, request: RunRequest) -> WorkflowState {
        self.executor
            .execute(request.into_state(), &NoopObserver, EventSink::disabled())
            .await
    }

    /// Start a run on the runtime and hand back its event stream
    ///
    /// Dropping `events` before `completed` cancels the run.
    pub fn stream(&self, request: RunRequest) -> StreamingRun {
        let (sink, events) = transport::channel(self.config.event_buffer, self.config.send_timeout());
        let executor = self.executor.clone();
        let state = request.into_state();
        log::info!("Streaming run {} for user {}", state.run_id(), state.user_id());

        let outcome = tokio::spawn(async move {
            let translator = EventTranslator::new(sink.clone());
            executor.execute(state, &translator, sink).await
        });

        StreamingRun { events, outcome }
    }
}
