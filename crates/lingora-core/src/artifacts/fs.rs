// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Filesystem-backed artifact store.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::CoreError;

use super::{ArtifactStore, PutOptions};

/// Artifact store backed by a local directory.
///
/// Objects are stored as plain files under the root directory. Upload
/// metadata (content type, cache directives) is not persisted; the serving
/// layer applies headers based on the artifact path when it serves the
/// public read path.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Create a store rooted at the given directory. The directory is
    /// created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve an artifact path under the root, rejecting anything that
    /// would escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf, CoreError> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|component| {
            !matches!(component, Component::Normal(_) | Component::CurDir)
        });
        if escapes || path.is_empty() {
            return Err(CoreError::ArtifactError {
                path: path.to_string(),
                details: "invalid artifact path".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, path: &str, bytes: &[u8], _options: &PutOptions) -> Result<(), CoreError> {
        let target = self.resolve(path)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::ArtifactError {
                    path: path.to_string(),
                    details: format!("failed to create directory: {}", e),
                })?;
        }

        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| CoreError::ArtifactError {
                path: path.to_string(),
                details: format!("failed to write artifact: {}", e),
            })?;

        debug!(path = %path, size = bytes.len(), "Artifact written");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let target = self.resolve(path)?;

        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::ArtifactError {
                path: path.to_string(),
                details: format!("failed to read artifact: {}", e),
            }),
        }
    }
}
