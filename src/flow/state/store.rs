// SPDX-License-Identifier: MIT

//! Runtime state threaded through every node of one run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::patch::StatePatch;
use super::schema::{Field, LogEntry, Message, RunStatus};
use crate::flow::error::{ErrorInfo, FlowError, Result};

/// The single record shared by all stages of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    run_id: String,

    // Identity, fixed at creation
    user_id: String,
    request: String,
    context: Map<String, Value>,

    // Accumulated, each owned by one node
    understanding: Option<Value>,
    strategy: Option<Value>,
    materials: Option<Value>,
    content_result: Option<Value>,
    publish_result: Option<Value>,

    // Control
    status: RunStatus,
    current_node: String,
    error: Option<ErrorInfo>,

    // Audit
    logs: Vec<LogEntry>,
    messages: Vec<Message>,
    trail: Vec<String>,
}

impl WorkflowState {
    /// Create a fresh running state with a new run id
    pub fn new(
        user_id: impl Into<String>,
        request: impl Into<String>,
        context: Map<String, Value>,
    ) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            request: request.into(),
            context,
            understanding: None,
            strategy: None,
            materials: None,
            content_result: None,
            publish_result: None,
            status: RunStatus::Running,
            current_node: String::new(),
            error: None,
            logs: Vec::new(),
            messages: Vec::new(),
            trail: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    /// Read a context entry
    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn current_node(&self) -> &str {
        &self.current_node
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Nodes invoked so far, in order
    pub fn trail(&self) -> &[String] {
        &self.trail
    }

    /// Get an accumulated field
    pub fn get(&self, field: Field) -> Option<&Value> {
        match field {
            Field::Understanding => self.understanding.as_ref(),
            Field::Strategy => self.strategy.as_ref(),
            Field::Materials => self.materials.as_ref(),
            Field::ContentResult => self.content_result.as_ref(),
            Field::PublishResult => self.publish_result.as_ref(),
            Field::Error | Field::Status => None,
        }
    }

    /// Get an accumulated field that an earlier node must have produced
    pub fn require(&self, field: Field) -> Result<&Value> {
        self.get(field).ok_or_else(|| {
            FlowError::invariant(format!("'{}' is required but has not been produced", field))
        })
    }

    fn slot(&mut self, field: Field) -> Option<&mut Option<Value>> {
        match field {
            Field::Understanding => Some(&mut self.understanding),
            Field::Strategy => Some(&mut self.strategy),
            Field::Materials => Some(&mut self.materials),
            Field::ContentResult => Some(&mut self.content_result),
            Field::PublishResult => Some(&mut self.publish_result),
            Field::Error | Field::Status => None,
        }
    }

    /// Merge a node's patch, enforcing field ownership
    ///
    /// The patch is checked as a whole before anything is written, so a
    /// rejected patch leaves the state untouched.
    pub fn apply(&mut self, patch: StatePatch, owned: &[Field]) -> Result<()> {
        for field in patch.touched() {
            if !owned.contains(&field) {
                return Err(FlowError::invariant(format!(
                    "node '{}' wrote '{}' which it does not own",
                    self.current_node, field
                )));
            }
        }

        for field in patch.writes.keys() {
            if !field.is_accumulated() {
                return Err(FlowError::invariant(format!(
                    "'{}' is a control field and cannot be written as a value",
                    field
                )));
            }
            if self.get(*field).is_some() {
                return Err(FlowError::invariant(format!(
                    "node '{}' overwrote '{}' which is write-once",
                    self.current_node, field
                )));
            }
        }

        if let Some(next) = patch.status {
            if !self.status.can_transition_to(next) {
                return Err(FlowError::invariant(format!(
                    "illegal status transition {:?} -> {:?}",
                    self.status, next
                )));
            }
        }

        for (field, value) in patch.writes {
            if let Some(slot) = self.slot(field) {
                *slot = Some(value);
            }
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(error) = patch.error {
            self.error = Some(error);
        }
        self.logs.extend(patch.logs);
        self.messages.extend(patch.messages);

        Ok(())
    }

    pub(crate) fn enter(&mut self, node: &str) {
        self.current_node = node.to_string();
        self.trail.push(node.to_string());
    }

    /// Executor-owned failure transition used when no node can record it
    pub(crate) fn force_fail(&mut self, info: ErrorInfo) {
        if self.status == RunStatus::Running {
            self.status = RunStatus::Failed;
        }
        if self.error.is_none() {
            self.error = Some(info);
        }
    }

    pub(crate) fn push_log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
    }

    /// Summary persisted by the record step and returned to callers
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            user_id: self.user_id.clone(),
            request: self.request.clone(),
            status: self.status,
            publish_result: self.publish_result.clone(),
            error: self.error.clone(),
            trail: self.trail.clone(),
            finished_at: Utc::now(),
        }
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Final-state summary persisted by the record step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub user_id: String,
    pub request: String,
    pub status: RunStatus,
    pub publish_result: Option<Value>,
    pub error: Option<ErrorInfo>,
    pub trail: Vec<String>,
    pub finished_at: DateTime<Utc>,
}
