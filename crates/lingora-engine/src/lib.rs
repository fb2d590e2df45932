// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lingora Engine - Release and Rollback Workflows
//!
//! This crate turns the storage layer from `lingora-core` into the two
//! durable workflows at the heart of the system:
//!
//! - **Release**: snapshot the current draft (per-locale JSON files plus one
//!   gzip recovery backup), persist the artifacts, then atomically promote
//!   the draft to live.
//! - **Rollback**: replay an archived version's backup over the content
//!   tables, then promote that version back to live.
//!
//! # Durable steps
//!
//! Both workflows execute as sequences of named, independently retried,
//! checkpointed steps (see [`step::StepRunner`]). A step's first successful
//! result is persisted; re-invoking the workflow after a crash restores
//! completed steps from their checkpoints and continues from the first
//! incomplete one. Concurrent work inside a phase (per-language fetches,
//! parallel artifact writes) is fanned out and joined before the next phase
//! begins; phases are strictly sequential.
//!
//! The promote step runs last in both workflows, by construction. A version
//! therefore never becomes live unless its artifacts already exist - the
//! invariant the public read path depends on.
//!
//! # Failure taxonomy
//!
//! | Class | Examples | Handling |
//! |-------|----------|----------|
//! | Fatal | no draft to publish, target not archived, backup missing/malformed | abort immediately, no retry |
//! | Transient | store timeout, artifact write error | bounded retries with exponential backoff |
//!
//! Exhausting a step's retry budget fails the whole workflow; the failure
//! reason is recorded on the instance row. There is no cross-step
//! compensation: a failed promote leaves already-written artifacts orphaned,
//! which is harmless because no live version points at them.
//!
//! # Concurrency assumption
//!
//! At most one release/rollback is assumed in flight at a time (single-writer
//! draft, enforced operationally). Promote performs no compare-and-swap on
//! the expected prior live version, so concurrent release+rollback is a
//! known race.

pub mod engine;
pub mod error;
pub mod release;
pub mod rollback;
pub mod step;

pub use engine::{Engine, WorkflowKind};
pub use error::{EngineError, Result, StepFailure};
pub use release::{ReleaseOutcome, ReleaseWorkflow};
pub use rollback::{RollbackOutcome, RollbackWorkflow};
pub use step::{Backoff, RetryPolicy, StepPolicy, StepRunner, WorkflowPolicies};
