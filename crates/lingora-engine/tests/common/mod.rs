// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared helpers for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use lingora_core::{
    ArtifactStore, CheckpointRecord, CoreError, InstanceRecord, InstanceStatus, LanguageRecord,
    MemoryArtifactStore, Persistence, PutOptions, SqlitePersistence, TranslationRow,
    VersionRecord, VersionStatus,
};
use lingora_engine::{Backoff, RetryPolicy, StepPolicy, WorkflowPolicies};

/// Fresh in-memory store.
pub async fn store() -> Arc<SqlitePersistence> {
    Arc::new(
        SqlitePersistence::in_memory()
            .await
            .expect("Failed to create in-memory store"),
    )
}

/// Step policies with a small budget and no real backoff, so failure-path
/// tests stay fast.
pub fn fast_policies() -> WorkflowPolicies {
    let policy = StepPolicy {
        retries: RetryPolicy::new(2, 1, Backoff::Fixed),
        timeout: Duration::from_secs(5),
    };
    WorkflowPolicies {
        metadata: policy.clone(),
        bulk: policy,
    }
}

/// Policies that never retry, for observing first-failure state.
pub fn no_retry_policies() -> WorkflowPolicies {
    let policy = StepPolicy {
        retries: RetryPolicy::new(0, 1, Backoff::Fixed),
        timeout: Duration::from_secs(5),
    };
    WorkflowPolicies {
        metadata: policy.clone(),
        bulk: policy,
    }
}

/// Seed `en` (default) and `fr`, with the scenario translations used across
/// the release tests: en has `a` and `b`, fr only has `a`.
pub async fn seed_scenario(store: &dyn Persistence) {
    store.insert_language("en", true).await.unwrap();
    store.insert_language("fr", false).await.unwrap();

    upsert(store, "a", "en", "A").await;
    upsert(store, "b", "en", "B").await;
    upsert(store, "a", "fr", "Ah").await;
}

pub async fn upsert(store: &dyn Persistence, key: &str, language: &str, value: &str) {
    store
        .upsert_translation(&TranslationRow {
            key: key.to_string(),
            language: language.to_string(),
            value: value.to_string(),
        })
        .await
        .unwrap();
}

/// Poll an instance until it reaches a terminal status.
pub async fn wait_for_terminal(store: &dyn Persistence, instance_id: &str) -> InstanceRecord {
    for _ in 0..250 {
        let instance = store
            .get_instance(instance_id)
            .await
            .unwrap()
            .expect("Instance should exist");
        if instance.status == InstanceStatus::Completed.as_str()
            || instance.status == InstanceStatus::Failed.as_str()
        {
            return instance;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Instance '{instance_id}' did not reach a terminal status");
}

/// Artifact store wrapper that fails a configurable number of puts before
/// delegating, for exercising retry and resume paths.
pub struct FlakyArtifactStore {
    inner: Arc<MemoryArtifactStore>,
    failures_remaining: AtomicU32,
    fail_all: AtomicBool,
}

impl FlakyArtifactStore {
    pub fn new(inner: Arc<MemoryArtifactStore>) -> Self {
        Self {
            inner,
            failures_remaining: AtomicU32::new(0),
            fail_all: AtomicBool::new(false),
        }
    }

    pub fn fail_next_puts(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    fn should_fail(&self) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return true;
        }
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }
}

#[async_trait]
impl ArtifactStore for FlakyArtifactStore {
    async fn put(&self, path: &str, bytes: &[u8], options: &PutOptions) -> Result<(), CoreError> {
        if self.should_fail() {
            return Err(CoreError::ArtifactError {
                path: path.to_string(),
                details: "injected write failure".to_string(),
            });
        }
        self.inner.put(path, bytes, options).await
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, CoreError> {
        self.inner.get(path).await
    }
}

/// Persistence wrapper with per-operation failure switches, for observing
/// partially applied workflow state.
pub struct HookedPersistence {
    inner: Arc<dyn Persistence>,
    pub fail_promote: AtomicBool,
    pub fail_insert_language: AtomicBool,
}

impl HookedPersistence {
    pub fn new(inner: Arc<dyn Persistence>) -> Self {
        Self {
            inner,
            fail_promote: AtomicBool::new(false),
            fail_insert_language: AtomicBool::new(false),
        }
    }

    fn injected(operation: &str) -> CoreError {
        CoreError::DatabaseError {
            operation: operation.to_string(),
            details: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl Persistence for HookedPersistence {
    async fn create_version(
        &self,
        description: Option<&str>,
        created_by: Option<&str>,
    ) -> Result<VersionRecord, CoreError> {
        self.inner.create_version(description, created_by).await
    }

    async fn get_version(&self, version_id: i64) -> Result<Option<VersionRecord>, CoreError> {
        self.inner.get_version(version_id).await
    }

    async fn get_latest_version(
        &self,
        status: Option<VersionStatus>,
    ) -> Result<Option<VersionRecord>, CoreError> {
        self.inner.get_latest_version(status).await
    }

    async fn list_versions(&self) -> Result<Vec<VersionRecord>, CoreError> {
        self.inner.list_versions().await
    }

    async fn promote_version(&self, version_id: i64) -> Result<(), CoreError> {
        if self.fail_promote.load(Ordering::SeqCst) {
            return Err(Self::injected("promote_version"));
        }
        self.inner.promote_version(version_id).await
    }

    async fn get_languages(&self) -> Result<Vec<LanguageRecord>, CoreError> {
        self.inner.get_languages().await
    }

    async fn insert_language(&self, locale: &str, is_default: bool) -> Result<(), CoreError> {
        if self.fail_insert_language.load(Ordering::SeqCst) {
            return Err(Self::injected("insert_language"));
        }
        self.inner.insert_language(locale, is_default).await
    }

    async fn delete_all_languages(&self) -> Result<(), CoreError> {
        self.inner.delete_all_languages().await
    }

    async fn get_translations(&self, locale: &str) -> Result<Vec<TranslationRow>, CoreError> {
        self.inner.get_translations(locale).await
    }

    async fn upsert_translation(&self, row: &TranslationRow) -> Result<(), CoreError> {
        self.inner.upsert_translation(row).await
    }

    async fn insert_translations(&self, rows: &[TranslationRow]) -> Result<(), CoreError> {
        self.inner.insert_translations(rows).await
    }

    async fn delete_all_translations(&self) -> Result<(), CoreError> {
        self.inner.delete_all_translations().await
    }

    async fn register_instance(
        &self,
        instance_id: &str,
        kind: &str,
        payload: &str,
    ) -> Result<(), CoreError> {
        self.inner.register_instance(instance_id, kind, payload).await
    }

    async fn get_instance(&self, instance_id: &str) -> Result<Option<InstanceRecord>, CoreError> {
        self.inner.get_instance(instance_id).await
    }

    async fn update_instance_status(
        &self,
        instance_id: &str,
        status: InstanceStatus,
        started_at: Option<DateTime<Utc>>,
    ) -> Result<(), CoreError> {
        self.inner
            .update_instance_status(instance_id, status, started_at)
            .await
    }

    async fn complete_instance(
        &self,
        instance_id: &str,
        output: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), CoreError> {
        self.inner.complete_instance(instance_id, output, error).await
    }

    async fn save_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
        state: &[u8],
    ) -> Result<(), CoreError> {
        self.inner
            .save_checkpoint(instance_id, checkpoint_id, state)
            .await
    }

    async fn load_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<CheckpointRecord>, CoreError> {
        self.inner.load_checkpoint(instance_id, checkpoint_id).await
    }
}
