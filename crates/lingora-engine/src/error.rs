// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engine-specific error types.

use lingora_core::CoreError;
use thiserror::Error;

/// Errors that terminate a workflow run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A step failed with a business error; retrying cannot help.
    #[error("step '{step}' failed: {reason}")]
    Fatal {
        /// The step that failed.
        step: String,
        /// The failure reason.
        reason: String,
    },

    /// A step exhausted its retry budget on transient failures.
    #[error("step '{step}' failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// The step that failed.
        step: String,
        /// Total attempts made, initial attempt included.
        attempts: u32,
        /// The most recent failure.
        last_error: String,
    },

    /// Checkpointed step state could not be serialized or restored.
    #[error("invalid checkpoint state for step '{step}': {details}")]
    State {
        /// The step the state belongs to.
        step: String,
        /// Error details.
        details: String,
    },

    /// Storage-layer failure outside step execution (instance bookkeeping).
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EngineError {
    /// Whether this is a business failure that no retry can resolve.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// Type alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure raised inside a step body.
///
/// The step runner retries `Transient` failures according to the step's
/// policy and aborts immediately on `Fatal` ones. Storage errors convert to
/// `Transient` by default; step bodies mark business errors `Fatal`
/// explicitly.
#[derive(Debug, Error)]
pub enum StepFailure {
    /// Business error; aborts the workflow without retrying.
    #[error("{0}")]
    Fatal(String),

    /// Infrastructure error; retried within the step's budget.
    #[error("{0}")]
    Transient(String),
}

impl From<CoreError> for StepFailure {
    fn from(err: CoreError) -> Self {
        StepFailure::Transient(err.to_string())
    }
}
