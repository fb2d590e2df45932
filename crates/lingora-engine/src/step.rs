// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Durable step execution.
//!
//! A workflow is a sequence of named steps. Each step is checkpointed: the
//! first successful execution persists its serialized result, and any later
//! run of the same (instance, step) pair returns that result without
//! executing the body again. This is what makes workflow re-invocation after
//! a crash resume instead of repeat - step bodies only need to be idempotent
//! under at-least-once execution of the *current* step.
//!
//! Retry, backoff, and timeout behavior is data ([`StepPolicy`]) passed to
//! the runner, never logic inside step bodies.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use lingora_core::Persistence;

use crate::error::{EngineError, Result, StepFailure};

/// Strategy for calculating delay between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Constant delay between attempts.
    Fixed,
    /// Exponential backoff: delay * 2^(attempt-1)
    #[default]
    Exponential,
}

/// Retry budget for a single step.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt (0 = try once).
    pub limit: u32,
    /// Base delay between retries in milliseconds.
    pub delay_ms: u64,
    /// Strategy for calculating per-attempt delays.
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(limit: u32, delay_ms: u64, backoff: Backoff) -> Self {
        Self {
            limit,
            delay_ms,
            backoff,
        }
    }

    /// Calculate the delay before the given retry attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = match self.backoff {
            Backoff::Fixed => 1,
            Backoff::Exponential => 2u64.saturating_pow(attempt.saturating_sub(1)),
        };
        Duration::from_millis(self.delay_ms.saturating_mul(multiplier))
    }
}

/// Execution policy for a single step: retry budget plus a per-attempt timeout.
#[derive(Debug, Clone)]
pub struct StepPolicy {
    /// Retry budget.
    pub retries: RetryPolicy,
    /// Per-attempt timeout; exceeding it counts as a transient failure.
    pub timeout: Duration,
}

impl StepPolicy {
    /// Policy for metadata fetches and promotions: shallow retry budget,
    /// short timeout.
    pub fn metadata() -> Self {
        Self {
            retries: RetryPolicy::new(3, 500, Backoff::Exponential),
            timeout: Duration::from_secs(10),
        }
    }

    /// Policy for bulk artifact writes and table restores: deeper budget,
    /// longer timeout.
    pub fn bulk() -> Self {
        Self {
            retries: RetryPolicy::new(5, 1000, Backoff::Exponential),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Per-workflow step policies, injectable for tests and tuning.
#[derive(Debug, Clone)]
pub struct WorkflowPolicies {
    /// Policy applied to metadata steps.
    pub metadata: StepPolicy,
    /// Policy applied to bulk steps.
    pub bulk: StepPolicy,
}

impl Default for WorkflowPolicies {
    fn default() -> Self {
        Self {
            metadata: StepPolicy::metadata(),
            bulk: StepPolicy::bulk(),
        }
    }
}

/// Checkpointed step executor bound to one workflow instance.
pub struct StepRunner {
    persistence: Arc<dyn Persistence>,
    instance_id: String,
}

impl StepRunner {
    /// Create a runner for the given instance.
    pub fn new(persistence: Arc<dyn Persistence>, instance_id: impl Into<String>) -> Self {
        Self {
            persistence,
            instance_id: instance_id.into(),
        }
    }

    /// The workflow instance this runner executes for.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Execute a named step.
    ///
    /// If a checkpoint exists for `(instance, name)`, its state is restored
    /// and the body is not executed. Otherwise the body runs under the
    /// policy's timeout; transient failures are retried with bounded backoff,
    /// fatal failures abort immediately, and the first successful result is
    /// checkpointed before it is returned.
    #[instrument(skip_all, fields(instance_id = %self.instance_id, step = name))]
    pub async fn run<T, F, Fut>(&self, name: &str, policy: &StepPolicy, op: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, StepFailure>>,
    {
        if let Some(checkpoint) = self
            .persistence
            .load_checkpoint(&self.instance_id, name)
            .await?
        {
            debug!("Checkpoint found - restoring step result");
            return serde_json::from_slice(&checkpoint.state).map_err(|e| EngineError::State {
                step: name.to_string(),
                details: e.to_string(),
            });
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let outcome = match tokio::time::timeout(policy.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(StepFailure::Transient(format!(
                    "timed out after {}ms",
                    policy.timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(value) => {
                    let state = serde_json::to_vec(&value).map_err(|e| EngineError::State {
                        step: name.to_string(),
                        details: e.to_string(),
                    })?;
                    self.persistence
                        .save_checkpoint(&self.instance_id, name, &state)
                        .await?;
                    debug!(attempt, "Step completed");
                    return Ok(value);
                }
                Err(StepFailure::Fatal(reason)) => {
                    warn!(attempt, reason = %reason, "Step failed fatally");
                    return Err(EngineError::Fatal {
                        step: name.to_string(),
                        reason,
                    });
                }
                Err(StepFailure::Transient(reason)) => {
                    if attempt > policy.retries.limit {
                        warn!(attempts = attempt, last_error = %reason, "Step exhausted retries");
                        return Err(EngineError::RetriesExhausted {
                            step: name.to_string(),
                            attempts: attempt,
                            last_error: reason,
                        });
                    }
                    let delay = policy.retries.delay_for_attempt(attempt);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %reason,
                        "Step failed - retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
