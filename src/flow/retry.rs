// SPDX-License-Identifier: MIT

//! Bounded retry decorator for nodes

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::flow::error::{ErrorKind, FlowError, Result};
use crate::flow::node::{Node, NodeContext};
use crate::flow::state::{Field, StatePatch, WorkflowState};

/// Delay between retry attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffPolicy {
    /// Retry immediately
    None,
    /// Same delay every time
    Fixed { delay_ms: u64 },
    /// base * 2^attempt, capped at max
    Exponential { base_ms: u64, max_ms: u64 },
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            BackoffPolicy::None => Duration::ZERO,
            BackoffPolicy::Fixed { delay_ms } => Duration::from_millis(*delay_ms),
            BackoffPolicy::Exponential { base_ms, max_ms } => {
                let millis = base_ms.saturating_mul(2u64.saturating_pow(attempt));
                Duration::from_millis(millis.min(*max_ms))
            }
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential {
            base_ms: 500,
            max_ms: 30_000,
        }
    }
}

/// Per-node retry configuration; zero retries unless configured
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub backoff: BackoffPolicy,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: BackoffPolicy) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_retries > 0
    }
}

/// Re-runs the wrapped node on collaborator failures
///
/// Timeouts, cancellation and invariant violations are never retried. The
/// graph's per-node timeout bounds all attempts together.
pub struct RetryingNode {
    inner: Arc<dyn Node>,
    policy: RetryPolicy,
}

impl RetryingNode {
    pub fn new(inner: Arc<dyn Node>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Wrap `inner` only when the policy allows retries
    pub fn wrap(inner: Arc<dyn Node>, policy: RetryPolicy) -> Arc<dyn Node> {
        if policy.is_enabled() {
            Arc::new(Self::new(inner, policy))
        } else {
            inner
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl Node for RetryingNode {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn owns(&self) -> &[Field] {
        self.inner.owns()
    }

    async fn execute(&self, state: &WorkflowState, ctx: &NodeContext) -> Result<StatePatch> {
        let mut attempt = 0;
        loop {
            ctx.checkpoint()?;
            match self.inner.execute(state, ctx).await {
                Ok(patch) => return Ok(patch),
                Err(err)
                    if err.kind() == ErrorKind::CollaboratorFailure
                        && attempt < self.policy.max_retries =>
                {
                    let delay = self.policy.backoff.delay_for_attempt(attempt);
                    attempt += 1;
                    log::warn!(
                        "Node {} failed ({}), retry {}/{} in {:?}",
                        self.name(),
                        err,
                        attempt,
                        self.policy.max_retries,
                        delay
                    );
                    ctx.progress()
                        .message(format!(
                            "{} failed, retrying ({}/{})",
                            self.name(),
                            attempt,
                            self.policy.max_retries
                        ))
                        .await;
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = ctx.cancelled() => return Err(FlowError::Cancelled),
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}
