// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory artifact store for embedded deployments and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CoreError;

use super::{ArtifactStore, PutOptions};

/// A stored object with its upload metadata.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    /// Object content.
    pub bytes: Vec<u8>,
    /// MIME type supplied at upload.
    pub content_type: String,
    /// Cache directive supplied at upload.
    pub cache_control: String,
}

/// Artifact store keeping all objects in process memory.
///
/// Keeps upload metadata alongside the bytes so tests can assert on the
/// content type and cache directives the workflows supply.
#[derive(Default)]
pub struct MemoryArtifactStore {
    objects: RwLock<HashMap<String, StoredArtifact>>,
}

impl MemoryArtifactStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored object with metadata, or `None` when absent.
    pub async fn get_object(&self, path: &str) -> Option<StoredArtifact> {
        self.objects.read().await.get(path).cloned()
    }

    /// All stored paths, sorted.
    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, path: &str, bytes: &[u8], options: &PutOptions) -> Result<(), CoreError> {
        self.objects.write().await.insert(
            path.to_string(),
            StoredArtifact {
                bytes: bytes.to_vec(),
                content_type: options.content_type.clone(),
                cache_control: options.cache_control.clone(),
            },
        );
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self
            .objects
            .read()
            .await
            .get(path)
            .map(|object| object.bytes.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryArtifactStore::new();

        store
            .put("1/en.json", b"{}", &PutOptions::immutable_json())
            .await
            .unwrap();

        assert_eq!(store.get("1/en.json").await.unwrap(), Some(b"{}".to_vec()));
        assert_eq!(store.get("1/fr.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_metadata_is_retained() {
        let store = MemoryArtifactStore::new();

        store
            .put("1/en.json", b"{}", &PutOptions::immutable_json())
            .await
            .unwrap();
        store
            .put("1/backup.gz", b"gz", &PutOptions::backup())
            .await
            .unwrap();

        let snapshot = store.get_object("1/en.json").await.unwrap();
        assert_eq!(snapshot.content_type, "application/json");
        assert!(snapshot.cache_control.contains("immutable"));

        let backup = store.get_object("1/backup.gz").await.unwrap();
        assert_eq!(backup.content_type, "application/gzip");
        assert_eq!(backup.cache_control, "no-store");

        assert_eq!(store.paths().await, vec!["1/backup.gz", "1/en.json"]);
    }
}
