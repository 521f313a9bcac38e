// SPDX-License-Identifier: MIT

//! Partial state updates returned by nodes

use serde_json::Value;
use std::collections::BTreeMap;

use super::schema::{Field, LogEntry, LogLevel, Message, RunStatus};
use crate::flow::error::ErrorInfo;

/// Everything a node wants to change, applied by the executor in one step
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub(crate) writes: BTreeMap<Field, Value>,
    pub(crate) status: Option<RunStatus>,
    pub(crate) error: Option<ErrorInfo>,
    pub(crate) logs: Vec<LogEntry>,
    pub(crate) messages: Vec<Message>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an accumulated field
    pub fn set(mut self, field: Field, value: Value) -> Self {
        self.writes.insert(field, value);
        self
    }

    pub fn status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    pub fn log(mut self, node: &str, level: LogLevel, message: impl Into<String>) -> Self {
        self.logs.push(LogEntry::new(node, level, message));
        self
    }

    pub fn message(mut self, node: &str, content: impl Into<String>) -> Self {
        self.messages.push(Message::new(node, content));
        self
    }

    /// Every field this patch touches, including control fields
    pub fn touched(&self) -> Vec<Field> {
        let mut fields: Vec<Field> = self.writes.keys().copied().collect();
        if self.status.is_some() {
            fields.push(Field::Status);
        }
        if self.error.is_some() {
            fields.push(Field::Error);
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
            && self.status.is_none()
            && self.error.is_none()
            && self.logs.is_empty()
            && self.messages.is_empty()
    }
}
