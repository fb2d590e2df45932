// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Durable object storage for published artifacts.
//!
//! Published snapshots and recovery backups are keyed by version id:
//!
//! | Path | Content |
//! |------|---------|
//! | `{versionId}/{locale}.json` | Published key→value snapshot for one locale |
//! | `{versionId}/backup.gz` | Gzip-compressed recovery backup for the whole version |
//!
//! Artifacts are immutable once written: each publish mints a new version id,
//! so a path is never rewritten with different content. Overwriting the same
//! path with the same content (a retried step) is safe. Stores must provide
//! read-after-write consistency within one workflow execution.

pub mod fs;
pub mod memory;

pub use self::fs::FsArtifactStore;
pub use self::memory::MemoryArtifactStore;

use async_trait::async_trait;

use crate::error::CoreError;

/// Artifact path for the published snapshot of one locale.
pub fn snapshot_path(version_id: i64, locale: &str) -> String {
    format!("{}/{}.json", version_id, locale)
}

/// Artifact path for the recovery backup of one version.
pub fn backup_path(version_id: i64) -> String {
    format!("{}/backup.gz", version_id)
}

/// Upload metadata for an artifact write.
#[derive(Debug, Clone)]
pub struct PutOptions {
    /// MIME type served for the artifact.
    pub content_type: String,
    /// Cache directive served for the artifact.
    pub cache_control: String,
}

impl PutOptions {
    /// Options for published JSON snapshots: immutable, cached aggressively
    /// by the CDN in front of the public read path.
    pub fn immutable_json() -> Self {
        Self {
            content_type: "application/json".to_string(),
            cache_control: "public, max-age=31536000, immutable".to_string(),
        }
    }

    /// Options for recovery backups: internal objects, never cached.
    pub fn backup() -> Self {
        Self {
            content_type: "application/gzip".to_string(),
            cache_control: "no-store".to_string(),
        }
    }
}

/// Durable object storage interface.
///
/// Operations are not retried internally; callers (the workflows) wrap them
/// in retryable steps.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write an artifact at the given path, overwriting any existing object.
    async fn put(&self, path: &str, bytes: &[u8], options: &PutOptions) -> Result<(), CoreError>;

    /// Read an artifact, or `None` when no object exists at the path.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_paths() {
        assert_eq!(snapshot_path(3, "en"), "3/en.json");
        assert_eq!(snapshot_path(12, "pt-BR"), "12/pt-BR.json");
        assert_eq!(backup_path(3), "3/backup.gz");
    }
}
