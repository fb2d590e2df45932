// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for lingora-core.
//!
//! This module defines the persistence abstraction and backend implementations.
//! One trait covers the three stores the engine needs: the version table (the
//! authority for "what is currently live"), the mutable content draft
//! (languages + translations), and workflow instance bookkeeping (instances +
//! checkpoints).

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresPersistence;
pub use self::sqlite::SqlitePersistence;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle status of a content version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionStatus {
    /// Mutable working copy; at most one exists at any time.
    Draft,
    /// The published version the public read path serves; at most one exists.
    Live,
    /// A previously live version, kept for rollback.
    Archived,
}

impl VersionStatus {
    /// Returns the string representation stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Live => "live",
            Self::Archived => "archived",
        }
    }

    /// Parse a status from its stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "live" => Some(Self::Live),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Lifecycle status of a workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    /// Registered but not yet started.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Terminated with an error after exhausting retries.
    Failed,
}

impl InstanceStatus {
    /// Returns the string representation stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a status from its stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Version record from the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VersionRecord {
    /// Monotonic identifier assigned by the store.
    pub id: i64,
    /// Optional human-readable description ("fork from v3", a date, ...).
    pub description: Option<String>,
    /// Current status (draft, live, archived).
    pub status: String,
    /// When the version was created.
    pub created_at: DateTime<Utc>,
    /// User that created the version, if known.
    pub created_by: Option<String>,
}

impl VersionRecord {
    /// Typed view of the stored status string.
    pub fn version_status(&self) -> Option<VersionStatus> {
        VersionStatus::parse(&self.status)
    }
}

/// Language record from the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LanguageRecord {
    /// Locale code, e.g. "en" or "pt-BR". Primary key.
    pub locale: String,
    /// Whether this is the default language. Exactly one language is default
    /// whenever at least one language exists.
    pub is_default: bool,
}

/// Translation row from the persistence layer.
///
/// Composite-keyed by (`key`, `language`). This is also the row shape carried
/// in recovery backups, so it must stay serde-stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TranslationRow {
    /// Translation key.
    pub key: String,
    /// Locale this row belongs to.
    pub language: String,
    /// Translated value.
    pub value: String,
}

/// Workflow instance record from the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InstanceRecord {
    /// Unique identifier for the instance.
    pub instance_id: String,
    /// Workflow kind ("release" or "rollback").
    pub kind: String,
    /// JSON invocation parameters (`{}` for release, `{"versionId": N}` for rollback).
    pub payload: String,
    /// Current status (pending, running, completed, failed).
    pub status: String,
    /// Error message from failure.
    pub error: Option<String>,
    /// JSON output from successful completion.
    pub output: Option<String>,
    /// When the instance was registered.
    pub created_at: DateTime<Utc>,
    /// When the instance started running.
    pub started_at: Option<DateTime<Utc>>,
    /// When the instance finished (completed or failed).
    pub finished_at: Option<DateTime<Utc>>,
}

/// Checkpoint record from the persistence layer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CheckpointRecord {
    /// Database primary key.
    pub id: i64,
    /// Instance this checkpoint belongs to.
    pub instance_id: String,
    /// Unique step identifier within the instance.
    pub checkpoint_id: String,
    /// Serialized step result.
    pub state: Vec<u8>,
    /// When the checkpoint was created.
    pub created_at: DateTime<Utc>,
}

/// Persistence interface used by the workflow engine and the HTTP surface.
///
/// Store operations are not retried internally; callers wrap them in
/// retryable workflow steps.
#[allow(missing_docs)]
#[async_trait]
pub trait Persistence: Send + Sync {
    // ------------------------------------------------------------------
    // Version store
    // ------------------------------------------------------------------

    /// Insert a new version with status `draft` and return the stored record.
    async fn create_version(
        &self,
        description: Option<&str>,
        created_by: Option<&str>,
    ) -> Result<VersionRecord, CoreError>;

    async fn get_version(&self, version_id: i64) -> Result<Option<VersionRecord>, CoreError>;

    /// Most recent (highest id) version, optionally filtered by status.
    async fn get_latest_version(
        &self,
        status: Option<VersionStatus>,
    ) -> Result<Option<VersionRecord>, CoreError>;

    /// All versions, newest first.
    async fn list_versions(&self) -> Result<Vec<VersionRecord>, CoreError>;

    /// Archive the current live version (if any) and flip the target version
    /// to live, as a single transaction.
    ///
    /// Both halves are idempotent: archiving when nothing is live is a no-op,
    /// and setting an already-live row to live is a no-op, so a retry from
    /// the same workflow step is always safe. Returns
    /// [`CoreError::VersionNotFound`] when the target row does not exist.
    async fn promote_version(&self, version_id: i64) -> Result<(), CoreError>;

    /// Idempotent lazy draft creation.
    ///
    /// Returns the existing draft when one exists. Otherwise creates one,
    /// described as a fork of the current live version, or with today's date
    /// when nothing has ever been published. Callers invoke this before any
    /// content mutation so edits are always attributable to a draft version.
    async fn ensure_draft_exists(
        &self,
        created_by: Option<&str>,
    ) -> Result<VersionRecord, CoreError> {
        if let Some(draft) = self.get_latest_version(Some(VersionStatus::Draft)).await? {
            return Ok(draft);
        }

        let description = match self.get_latest_version(Some(VersionStatus::Live)).await? {
            Some(live) => format!("fork from v{}", live.id),
            None => Utc::now().format("%Y-%m-%d").to_string(),
        };

        self.create_version(Some(&description), created_by).await
    }

    // ------------------------------------------------------------------
    // Content store
    // ------------------------------------------------------------------

    /// All configured languages, default language first, then by locale.
    async fn get_languages(&self) -> Result<Vec<LanguageRecord>, CoreError>;

    /// Insert or update a language.
    async fn insert_language(&self, locale: &str, is_default: bool) -> Result<(), CoreError>;

    async fn delete_all_languages(&self) -> Result<(), CoreError>;

    /// All translation rows for one locale, ordered by key.
    async fn get_translations(&self, locale: &str) -> Result<Vec<TranslationRow>, CoreError>;

    /// Insert or update a single translation row.
    async fn upsert_translation(&self, row: &TranslationRow) -> Result<(), CoreError>;

    /// Insert or update a batch of translation rows.
    ///
    /// Callers are responsible for chunking to the storage layer's batch
    /// limits; this method issues one multi-row statement per call.
    async fn insert_translations(&self, rows: &[TranslationRow]) -> Result<(), CoreError>;

    async fn delete_all_translations(&self) -> Result<(), CoreError>;

    // ------------------------------------------------------------------
    // Workflow instances
    // ------------------------------------------------------------------

    /// Register a new workflow instance with status `pending`.
    async fn register_instance(
        &self,
        instance_id: &str,
        kind: &str,
        payload: &str,
    ) -> Result<(), CoreError>;

    async fn get_instance(&self, instance_id: &str) -> Result<Option<InstanceRecord>, CoreError>;

    async fn update_instance_status(
        &self,
        instance_id: &str,
        status: InstanceStatus,
        started_at: Option<DateTime<Utc>>,
    ) -> Result<(), CoreError>;

    /// Mark an instance terminal: completed with output, or failed with an error.
    async fn complete_instance(
        &self,
        instance_id: &str,
        output: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), CoreError>;

    // ------------------------------------------------------------------
    // Checkpoints
    // ------------------------------------------------------------------

    /// Save a step checkpoint. Saving the same (instance, checkpoint) pair
    /// again keeps the first committed state.
    async fn save_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
        state: &[u8],
    ) -> Result<(), CoreError>;

    async fn load_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<CheckpointRecord>, CoreError>;
}
