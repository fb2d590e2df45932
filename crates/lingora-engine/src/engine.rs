// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow instance lifecycle and dispatch.
//!
//! Enqueueing registers an instance row and spawns the workflow on the
//! runtime; it only confirms registration. The outcome is observed
//! asynchronously by polling instance status (or re-reading version status).
//! Re-invoking an existing instance resumes it from its checkpoints, which
//! is how a run interrupted by a process restart is driven to completion.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use lingora_core::{ArtifactStore, CoreError, InstanceStatus, Persistence};

use crate::error::{EngineError, Result};
use crate::release::ReleaseWorkflow;
use crate::rollback::RollbackWorkflow;
use crate::step::{StepRunner, WorkflowPolicies};

/// The workflows the engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    /// Publish the current draft version.
    Release,
    /// Restore an archived version from its backup.
    Rollback,
}

impl WorkflowKind {
    /// Returns the string representation stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Rollback => "rollback",
        }
    }

    /// Parse a kind from its stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "release" => Some(Self::Release),
            "rollback" => Some(Self::Rollback),
            _ => None,
        }
    }
}

/// Front door for enqueueing and running workflow instances.
#[derive(Clone)]
pub struct Engine {
    persistence: Arc<dyn Persistence>,
    artifacts: Arc<dyn ArtifactStore>,
    policies: WorkflowPolicies,
}

impl Engine {
    /// Create an engine with default step policies.
    pub fn new(persistence: Arc<dyn Persistence>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self::with_policies(persistence, artifacts, WorkflowPolicies::default())
    }

    /// Create an engine with explicit step policies.
    pub fn with_policies(
        persistence: Arc<dyn Persistence>,
        artifacts: Arc<dyn ArtifactStore>,
        policies: WorkflowPolicies,
    ) -> Self {
        Self {
            persistence,
            artifacts,
            policies,
        }
    }

    /// Register and start a release workflow instance. Returns immediately
    /// with the instance id; completion is observed by polling.
    pub async fn enqueue_release(&self) -> Result<String> {
        let instance_id = format!("release-{}", Uuid::new_v4());
        self.persistence
            .register_instance(&instance_id, WorkflowKind::Release.as_str(), "{}")
            .await?;
        self.spawn(instance_id.clone());

        info!(instance_id = %instance_id, "Release workflow enqueued");
        Ok(instance_id)
    }

    /// Register and start a rollback workflow instance for the given version.
    pub async fn enqueue_rollback(&self, version_id: i64) -> Result<String> {
        let instance_id = format!("rollback-{}", Uuid::new_v4());
        let payload = serde_json::json!({ "versionId": version_id }).to_string();
        self.persistence
            .register_instance(&instance_id, WorkflowKind::Rollback.as_str(), &payload)
            .await?;
        self.spawn(instance_id.clone());

        info!(instance_id = %instance_id, version_id, "Rollback workflow enqueued");
        Ok(instance_id)
    }

    fn spawn(&self, instance_id: String) {
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.run_instance(&instance_id).await {
                warn!(instance_id = %instance_id, error = %e, "Workflow instance failed");
            }
        });
    }

    /// Run (or resume) a registered instance to completion.
    ///
    /// Dispatches on the instance's kind and payload. Already-completed
    /// instances return without doing anything; failed or interrupted
    /// instances resume from their last checkpoint.
    pub async fn run_instance(&self, instance_id: &str) -> Result<()> {
        let instance = self
            .persistence
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| {
                EngineError::Core(CoreError::InstanceNotFound {
                    instance_id: instance_id.to_string(),
                })
            })?;

        if instance.status == InstanceStatus::Completed.as_str() {
            return Ok(());
        }

        let kind = WorkflowKind::parse(&instance.kind).ok_or_else(|| EngineError::Fatal {
            step: "dispatch".to_string(),
            reason: format!("unknown workflow kind '{}'", instance.kind),
        })?;

        self.persistence
            .update_instance_status(instance_id, InstanceStatus::Running, Some(Utc::now()))
            .await?;

        let runner = StepRunner::new(self.persistence.clone(), instance_id);
        let result = match kind {
            WorkflowKind::Release => {
                let workflow = ReleaseWorkflow::with_policies(
                    self.persistence.clone(),
                    self.artifacts.clone(),
                    self.policies.clone(),
                );
                workflow.run(&runner).await.and_then(encode_output)
            }
            WorkflowKind::Rollback => match rollback_version_id(&instance.payload) {
                Ok(version_id) => {
                    let workflow = RollbackWorkflow::with_policies(
                        self.persistence.clone(),
                        self.artifacts.clone(),
                        self.policies.clone(),
                    );
                    workflow
                        .run(&runner, version_id)
                        .await
                        .and_then(encode_output)
                }
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(output) => {
                self.persistence
                    .complete_instance(instance_id, Some(&output), None)
                    .await?;
                info!(instance_id = %instance_id, "Workflow instance completed");
                Ok(())
            }
            Err(e) => {
                self.persistence
                    .complete_instance(instance_id, None, Some(&e.to_string()))
                    .await?;
                Err(e)
            }
        }
    }
}

fn encode_output<T: serde::Serialize>(outcome: T) -> Result<String> {
    serde_json::to_string(&outcome).map_err(|e| EngineError::State {
        step: "completion".to_string(),
        details: e.to_string(),
    })
}

/// Extract the target version id from a rollback instance payload.
fn rollback_version_id(payload: &str) -> Result<i64> {
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| EngineError::Fatal {
            step: "dispatch".to_string(),
            reason: format!("invalid instance payload: {e}"),
        })?;

    value
        .get("versionId")
        .and_then(|id| id.as_i64())
        .ok_or_else(|| EngineError::Fatal {
            step: "dispatch".to_string(),
            reason: "instance payload is missing versionId".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_kind_roundtrip() {
        assert_eq!(WorkflowKind::parse("release"), Some(WorkflowKind::Release));
        assert_eq!(
            WorkflowKind::parse(WorkflowKind::Rollback.as_str()),
            Some(WorkflowKind::Rollback)
        );
        assert_eq!(WorkflowKind::parse("unknown"), None);
    }

    #[test]
    fn test_rollback_version_id() {
        assert_eq!(rollback_version_id(r#"{"versionId":7}"#).unwrap(), 7);

        let err = rollback_version_id("{}").unwrap_err();
        assert!(err.is_fatal());

        let err = rollback_version_id("not json").unwrap_err();
        assert!(err.is_fatal());
    }
}
