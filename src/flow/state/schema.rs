// SPDX-License-Identifier: MIT

//! State field definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fields a node may own and write through a `StatePatch`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Understanding,
    Strategy,
    Materials,
    ContentResult,
    PublishResult,
    Error,
    Status,
}

impl Field {
    /// Accumulated fields are write-once per run
    pub fn is_accumulated(self) -> bool {
        !matches!(self, Field::Error | Field::Status)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Understanding => "understanding",
            Field::Strategy => "strategy",
            Field::Materials => "materials",
            Field::ContentResult => "content_result",
            Field::PublishResult => "publish_result",
            Field::Error => "error",
            Field::Status => "status",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Only `running -> success` and `running -> failed` are legal
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        self == RunStatus::Running && next.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One structured audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub node: String,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(node: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            node: node.into(),
            level,
            message: message.into(),
        }
    }
}

/// Human-readable trace line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: DateTime<Utc>,
    pub node: String,
    pub content: String,
}

impl Message {
    pub fn new(node: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            node: node.into(),
            content: content.into(),
        }
    }
}
