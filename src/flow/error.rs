// SPDX-License-Identifier: MIT

//! Typed error handling for the workflow engine
//!
//! `FlowError` is what nodes, collaborators and the loader return.
//! `ErrorInfo` is the serializable record that ends up in the state and
//! on the wire once a failure has been routed to the error node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for postflow
#[derive(Debug, Error)]
pub enum FlowError {
    /// An external collaborator returned an error
    #[error("Collaborator '{collaborator}' failed: {message}")]
    Collaborator {
        collaborator: String,
        message: String,
    },

    /// A node exceeded its time bound
    #[error("Node '{node}' timed out after {after:?}")]
    Timeout { node: String, after: Duration },

    /// The client dropped the stream or the run was cancelled
    #[error("Run cancelled")]
    Cancelled,

    /// A node or the graph broke an engine invariant
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The inbound request is unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors (bad graph wiring, missing endpoints)
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;

/// Failure classes visible to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    CollaboratorFailure,
    CollaboratorTimeout,
    Cancelled,
    InvariantViolation,
    InvalidInput,
}

impl ErrorKind {
    /// Whether this kind signals a bug rather than a runtime condition
    pub fn is_defect(self) -> bool {
        matches!(self, ErrorKind::InvariantViolation)
    }
}

impl FlowError {
    /// Create a collaborator failure
    pub fn collaborator(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }

    /// Create an invariant violation
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::Timeout { .. } => ErrorKind::CollaboratorTimeout,
            FlowError::Cancelled => ErrorKind::Cancelled,
            FlowError::InvariantViolation(_) | FlowError::Config(_) => {
                ErrorKind::InvariantViolation
            }
            FlowError::InvalidInput(_) => ErrorKind::InvalidInput,
            FlowError::Collaborator { .. }
            | FlowError::Io(_)
            | FlowError::Json(_)
            | FlowError::Yaml(_)
            | FlowError::Http(_) => ErrorKind::CollaboratorFailure,
        }
    }
}

/// Serializable failure record stored in `WorkflowState.error`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    /// Node that was running when the failure happened
    pub node: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, node: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            node: node.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Capture a `FlowError` raised while `node` was running
    pub fn from_error(node: &str, err: &FlowError) -> Self {
        Self::new(err.kind(), node, err.to_string())
    }

    pub fn cancelled(node: &str) -> Self {
        Self::new(ErrorKind::Cancelled, node, "client cancelled the run")
    }
}
