// SPDX-License-Identifier: MIT

//! Reusable graph execution engine
//!
//! Nodes exchange data only through a typed [`state::WorkflowState`]; the
//! [`graph::GraphExecutor`] walks a [`graph::GraphDefinition`] and reports
//! lifecycle to a [`events::RunObserver`], which the
//! [`events::EventTranslator`] turns into an ordered stream for one
//! [`transport::RunStream`] subscriber.

pub mod error;
pub mod events;
pub mod graph;
pub mod node;
pub mod retry;
pub mod state;
pub mod transport;

pub use error::{ErrorInfo, ErrorKind, FlowError, Result};
pub use events::{EventTranslator, EventType, NoopObserver, RunObserver, StreamEvent};
pub use graph::{GraphBuilder, GraphDefinition, GraphExecutor, Next};
pub use node::{Node, NodeContext, Progress};
pub use retry::{BackoffPolicy, RetryPolicy, RetryingNode};
pub use state::{Field, RunStatus, RunSummary, StatePatch, WorkflowState};
pub use transport::{channel, EventSink, RunStream};
