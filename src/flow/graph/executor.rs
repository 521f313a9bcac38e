// SPDX-License-Identifier: MIT

//! Graph workflow executor

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use super::types::{GraphDefinition, Next, NodeSpec};
use crate::flow::error::{ErrorInfo, FlowError, Result};
use crate::flow::events::RunObserver;
use crate::flow::node::NodeContext;
use crate::flow::state::{Field, LogEntry, LogLevel, RunStatus, StatePatch, WorkflowState};
use crate::flow::transport::EventSink;

/// Default cap on node invocations per run
pub const DEFAULT_MAX_ITERATIONS: usize = 32;

/// Runs a `GraphDefinition` against one `WorkflowState` at a time
///
/// Cloning is cheap; clones share the same immutable graph.
#[derive(Clone)]
pub struct GraphExecutor {
    graph: Arc<GraphDefinition>,
    max_iterations: usize,
}

impl GraphExecutor {
    pub fn new(graph: Arc<GraphDefinition>) -> Self {
        Self {
            graph,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn graph(&self) -> &Arc<GraphDefinition> {
        &self.graph
    }

    /// Run to completion and return the final state
    ///
    /// Nodes run strictly one after another. `sink` carries node progress
    /// events and the run's cancellation token.
    pub async fn execute(
        &self,
        initial: WorkflowState,
        observer: &dyn RunObserver,
        sink: EventSink,
    ) -> WorkflowState {
        let mut state = initial;
        let cancel = sink.cancellation();

        log::info!(
            "Starting run {} of graph '{}' for user {}",
            state.run_id(),
            self.graph.name(),
            state.user_id()
        );
        observer.run_started(&state).await;

        if let Err(err) = check_initial(&state) {
            report_defect(self.graph.entry(), &err);
            state.force_fail(ErrorInfo::from_error(self.graph.entry(), &err));
            observer.run_finished(&state).await;
            return state;
        }

        let mut current = self.graph.entry().to_string();
        let mut recovering: Option<ErrorInfo> = None;
        let mut iterations = 0;

        loop {
            iterations += 1;
            if iterations > self.max_iterations && recovering.is_none() {
                let err = FlowError::invariant(format!(
                    "routing exceeded {} node invocations",
                    self.max_iterations
                ));
                report_defect(&current, &err);
                recovering = Some(ErrorInfo::from_error(&current, &err));
                current = self.graph.error_node().to_string();
            }

            if cancel.is_cancelled() {
                log::warn!("Run {} cancelled before '{}'", state.run_id(), current);
                let info = recovering
                    .take()
                    .unwrap_or_else(|| ErrorInfo::cancelled(&current));
                state.force_fail(info);
                break;
            }

            let Some(spec) = self.graph.node(&current) else {
                let err = FlowError::invariant(format!("routed to unknown node '{}'", current));
                report_defect(&current, &err);
                let info = ErrorInfo::from_error(&current, &err);
                if recovering.is_some() {
                    state.force_fail(info);
                    break;
                }
                recovering = Some(info);
                current = self.graph.error_node().to_string();
                continue;
            };

            state.enter(&current);
            observer.node_started(&current).await;
            log::info!("Executing node: {}", current);

            let mut ctx = NodeContext::new(&current, state.run_id(), cancel.clone(), sink.clone());
            if let Some(failure) = &recovering {
                ctx = ctx.with_failure(failure.clone());
            }

            let started = Instant::now();
            let result = invoke(spec, &state, &ctx).await;
            let outcome = match result {
                Ok(patch) => state.apply(patch, spec.node.owns()),
                Err(err) => Err(err),
            };
            let elapsed = started.elapsed();
            observer
                .node_finished(&current, outcome.is_ok(), elapsed)
                .await;

            match outcome {
                Ok(()) => {
                    log::info!("Node {} completed in {:?}", current, elapsed);
                    if recovering.is_some() {
                        break;
                    }
                    match self.graph.next(&current, &state) {
                        Next::Terminal => break,
                        Next::Node(next) if next == self.graph.error_node() => {
                            let err = FlowError::invariant(format!(
                                "'{}' routed to the error node directly",
                                current
                            ));
                            report_defect(&current, &err);
                            recovering = Some(ErrorInfo::from_error(&current, &err));
                            current = next;
                        }
                        Next::Node(next) => current = next,
                    }
                }
                Err(FlowError::Cancelled) => {
                    log::warn!("Node {} stopped on cancellation", current);
                    // a failure being recovered outranks the cancellation
                    let info = recovering
                        .take()
                        .unwrap_or_else(|| ErrorInfo::cancelled(&current));
                    state.force_fail(info);
                    break;
                }
                Err(err) => {
                    if err.kind().is_defect() {
                        report_defect(&current, &err);
                    } else {
                        log::warn!("Node {} failed: {}", current, err);
                    }
                    let info = ErrorInfo::from_error(&current, &err);
                    state.push_log(LogEntry::new(&current, LogLevel::Error, err.to_string()));

                    if let Some(original) = recovering.take() {
                        log::error!("Error node '{}' itself failed: {}", current, err);
                        state.force_fail(original);
                        break;
                    }
                    recovering = Some(info);
                    current = self.graph.error_node().to_string();
                }
            }
        }

        if state.status() == RunStatus::Running {
            let err = FlowError::invariant(format!(
                "run ended at '{}' without a terminal status",
                state.current_node()
            ));
            report_defect(state.current_node(), &err);
            state.force_fail(ErrorInfo::from_error(state.current_node(), &err));
        }

        log::info!(
            "Run {} finished with status {:?} after {} node invocations",
            state.run_id(),
            state.status(),
            state.trail().len()
        );
        observer.run_finished(&state).await;
        state
    }
}

/// Invoke one node under its timeout, turning panics into defects
async fn invoke(spec: &NodeSpec, state: &WorkflowState, ctx: &NodeContext) -> Result<StatePatch> {
    let name = spec.node.name();
    let call = AssertUnwindSafe(spec.node.execute(state, ctx)).catch_unwind();

    let caught = match spec.timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(caught) => caught,
            Err(_) => {
                return Err(FlowError::Timeout {
                    node: name.to_string(),
                    after: limit,
                })
            }
        },
        None => call.await,
    };

    match caught {
        Ok(result) => result,
        Err(panic) => Err(FlowError::invariant(format!(
            "node '{}' panicked: {}",
            name,
            panic_message(panic.as_ref())
        ))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn check_initial(state: &WorkflowState) -> Result<()> {
    if state.status() != RunStatus::Running {
        return Err(FlowError::invariant("initial state is not running"));
    }
    let produced: Vec<Field> = [
        Field::Understanding,
        Field::Strategy,
        Field::Materials,
        Field::ContentResult,
        Field::PublishResult,
    ]
    .into_iter()
    .filter(|f| state.get(*f).is_some())
    .collect();
    if !produced.is_empty() {
        return Err(FlowError::invariant(format!(
            "initial state already carries {:?}",
            produced
        )));
    }
    Ok(())
}

/// Invariant violations are bugs; surface them to operators separately
fn report_defect(node: &str, err: &FlowError) {
    log::error!(target: "postflow::defect", "DEFECT in node '{}': {}", node, err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::events::{EventTranslator, EventType, NoopObserver, StreamEvent};
    use crate::flow::graph::GraphBuilder;
    use crate::flow::node::Node;
    use crate::flow::transport::channel;
    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Writes one owned field, or misbehaves on request
    struct Step {
        name: &'static str,
        owns: Vec<Field>,
        behaviour: Behaviour,
        calls: Arc<AtomicUsize>,
    }

    #[derive(Clone)]
    enum Behaviour {
        Write(Field),
        Finish,
        Fail,
        Sleep(Duration),
        Panic,
        Trespass(Field),
        Recover,
        Interrupted,
    }

    impl Step {
        fn new(name: &'static str, owns: Vec<Field>, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                name,
                owns,
                behaviour,
                calls: Arc::new(AtomicUsize::new(0)),
            })
        }
    }

    #[async_trait]
    impl Node for Step {
        fn name(&self) -> &str {
            self.name
        }

        fn owns(&self) -> &[Field] {
            &self.owns
        }

        async fn execute(&self, _state: &WorkflowState, ctx: &NodeContext) -> Result<StatePatch> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Write(field) => Ok(StatePatch::new().set(*field, json!(self.name))),
                Behaviour::Finish => Ok(StatePatch::new().status(RunStatus::Success)),
                Behaviour::Fail => Err(FlowError::collaborator("stub", "refused")),
                Behaviour::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(StatePatch::new())
                }
                Behaviour::Panic => panic!("node exploded"),
                Behaviour::Trespass(field) => Ok(StatePatch::new().set(*field, json!("stolen"))),
                Behaviour::Recover => {
                    let failure = ctx.failure().cloned().ok_or_else(|| {
                        FlowError::invariant("error node ran without a failure")
                    })?;
                    Ok(StatePatch::new().error(failure).status(RunStatus::Failed))
                }
                Behaviour::Interrupted => Err(FlowError::Cancelled),
            }
        }
    }

    fn recover() -> Arc<Step> {
        Step::new("recover", vec![Field::Error, Field::Status], Behaviour::Recover)
    }

    fn graph(first: Arc<Step>, timeout: Option<Duration>) -> GraphExecutor {
        let mut builder = GraphBuilder::new("test");
        builder = match timeout {
            Some(t) => builder.node_with_timeout(first, t),
            None => builder.node(first),
        };
        let graph = builder
            .node(Step::new("finish", vec![Field::Status], Behaviour::Finish))
            .node(recover())
            .entry("first")
            .error_node("recover")
            .chain(&["first", "finish"])
            .terminal("finish")
            .terminal("recover")
            .build()
            .unwrap();
        GraphExecutor::new(Arc::new(graph))
    }

    fn initial() -> WorkflowState {
        WorkflowState::new("u1", "request", Map::new())
    }

    async fn run(executor: &GraphExecutor) -> WorkflowState {
        executor
            .execute(initial(), &NoopObserver, EventSink::disabled())
            .await
    }

    #[tokio::test]
    async fn test_happy_path_reaches_success() {
        let first = Step::new("first", vec![Field::Strategy], Behaviour::Write(Field::Strategy));
        let state = run(&graph(first, None)).await;

        assert_eq!(state.status(), RunStatus::Success);
        assert_eq!(state.get(Field::Strategy), Some(&json!("first")));
        assert_eq!(state.trail(), ["first", "finish"]);
        assert!(state.error().is_none());
    }

    #[tokio::test]
    async fn test_failure_jumps_to_error_node() {
        let first = Step::new("first", vec![], Behaviour::Fail);
        let state = run(&graph(first, None)).await;

        assert_eq!(state.status(), RunStatus::Failed);
        assert_eq!(state.trail(), ["first", "recover"]);
        let error = state.error().unwrap();
        assert_eq!(error.kind, crate::flow::error::ErrorKind::CollaboratorFailure);
        assert_eq!(error.node, "first");
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let first = Step::new("first", vec![], Behaviour::Sleep(Duration::from_secs(5)));
        let state = run(&graph(first, Some(Duration::from_millis(20)))).await;

        assert_eq!(state.status(), RunStatus::Failed);
        assert_eq!(
            state.error().unwrap().kind,
            crate::flow::error::ErrorKind::CollaboratorTimeout
        );
        assert_eq!(state.trail(), ["first", "recover"]);
    }

    #[tokio::test]
    async fn test_panic_is_an_invariant_violation() {
        let first = Step::new("first", vec![], Behaviour::Panic);
        let state = run(&graph(first, None)).await;

        assert_eq!(state.status(), RunStatus::Failed);
        let error = state.error().unwrap();
        assert_eq!(error.kind, crate::flow::error::ErrorKind::InvariantViolation);
        assert!(error.message.contains("node exploded"));
    }

    #[tokio::test]
    async fn test_foreign_write_is_rejected_and_routed() {
        let first = Step::new(
            "first",
            vec![Field::Strategy],
            Behaviour::Trespass(Field::PublishResult),
        );
        let state = run(&graph(first, None)).await;

        assert_eq!(state.status(), RunStatus::Failed);
        assert!(state.get(Field::PublishResult).is_none());
        assert_eq!(
            state.error().unwrap().kind,
            crate::flow::error::ErrorKind::InvariantViolation
        );
        assert_eq!(state.trail(), ["first", "recover"]);
    }

    #[tokio::test]
    async fn test_iteration_cap_stops_routing_loop() {
        let graph = GraphBuilder::new("loop")
            .node(Step::new("spin", vec![], Behaviour::Sleep(Duration::ZERO)))
            .node(recover())
            .entry("spin")
            .error_node("recover")
            .conditional("spin", |_| Next::Node("spin".into()))
            .terminal("recover")
            .build()
            .unwrap();
        let executor = GraphExecutor::new(Arc::new(graph)).with_max_iterations(5);
        let state = run(&executor).await;

        assert_eq!(state.status(), RunStatus::Failed);
        assert_eq!(
            state.error().unwrap().kind,
            crate::flow::error::ErrorKind::InvariantViolation
        );
        assert_eq!(state.trail().len(), 6);
        assert_eq!(state.trail().last().map(String::as_str), Some("recover"));
    }

    #[tokio::test]
    async fn test_cancelled_run_invokes_nothing() {
        let first = Step::new("first", vec![Field::Strategy], Behaviour::Write(Field::Strategy));
        let calls = first.calls.clone();
        let executor = graph(first, None);

        let (sink, stream) = channel(16, Duration::from_secs(1));
        drop(stream);
        let state = executor.execute(initial(), &NoopObserver, sink).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(state.status(), RunStatus::Failed);
        assert_eq!(
            state.error().unwrap().kind,
            crate::flow::error::ErrorKind::Cancelled
        );
    }

    #[tokio::test]
    async fn test_conditional_route_to_error_node_is_a_defect() {
        let graph = GraphBuilder::new("test")
            .node(Step::new("first", vec![Field::Strategy], Behaviour::Write(Field::Strategy)))
            .node(recover())
            .entry("first")
            .error_node("recover")
            .conditional("first", |_| Next::Node("recover".into()))
            .terminal("recover")
            .build()
            .unwrap();
        let state = run(&GraphExecutor::new(Arc::new(graph))).await;

        assert_eq!(state.status(), RunStatus::Failed);
        let error = state.error().unwrap();
        assert_eq!(error.kind, crate::flow::error::ErrorKind::InvariantViolation);
        assert_eq!(error.node, "first");
        assert_eq!(state.trail(), ["first", "recover"]);
    }

    #[tokio::test]
    async fn test_conditional_route_to_unknown_node_is_a_defect() {
        let graph = GraphBuilder::new("test")
            .node(Step::new("first", vec![Field::Strategy], Behaviour::Write(Field::Strategy)))
            .node(recover())
            .entry("first")
            .error_node("recover")
            .conditional("first", |_| Next::Node("nowhere".into()))
            .terminal("recover")
            .build()
            .unwrap();
        let state = run(&GraphExecutor::new(Arc::new(graph))).await;

        assert_eq!(state.status(), RunStatus::Failed);
        assert!(state.error().unwrap().message.contains("nowhere"));
        assert_eq!(state.trail(), ["first", "recover"]);
    }

    #[tokio::test]
    async fn test_cancelled_error_node_keeps_original_failure() {
        let graph = GraphBuilder::new("test")
            .node(Step::new("first", vec![], Behaviour::Fail))
            .node(Step::new(
                "recover",
                vec![Field::Error, Field::Status],
                Behaviour::Interrupted,
            ))
            .entry("first")
            .error_node("recover")
            .terminal("first")
            .terminal("recover")
            .build()
            .unwrap();
        let state = run(&GraphExecutor::new(Arc::new(graph))).await;

        assert_eq!(state.status(), RunStatus::Failed);
        let error = state.error().unwrap();
        assert_eq!(error.kind, crate::flow::error::ErrorKind::CollaboratorFailure);
        assert_eq!(error.node, "first");
        assert_eq!(state.trail(), ["first", "recover"]);
    }

    #[tokio::test]
    async fn test_translator_sequence_on_success() {
        let first = Step::new("first", vec![Field::Strategy], Behaviour::Write(Field::Strategy));
        let executor = graph(first, None);
        let (sink, stream) = channel(64, Duration::from_secs(1));
        let translator = EventTranslator::new(sink.clone());

        let state = executor.execute(initial(), &translator, sink).await;
        let events: Vec<StreamEvent> = stream.collect().await;
        let kinds: Vec<EventType> = events.iter().map(|e| e.kind).collect();

        assert_eq!(state.status(), RunStatus::Success);
        assert_eq!(
            kinds,
            vec![
                EventType::Started,
                EventType::NodeStart,
                EventType::NodeEnd,
                EventType::NodeStart,
                EventType::NodeEnd,
                EventType::Completed,
            ]
        );
        assert_eq!(events[1].node.as_deref(), Some("first"));
        assert_eq!(events[2].payload["success"], true);
    }

    #[tokio::test]
    async fn test_initial_state_with_results_is_rejected() {
        let first = Step::new("first", vec![Field::Strategy], Behaviour::Write(Field::Strategy));
        let calls = first.calls.clone();
        let executor = graph(first, None);

        let mut dirty = initial();
        dirty.enter("setup");
        dirty
            .apply(StatePatch::new().set(Field::Strategy, json!(1)), &[Field::Strategy])
            .unwrap();
        let state = executor
            .execute(dirty, &NoopObserver, EventSink::disabled())
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(state.status(), RunStatus::Failed);
    }
}
