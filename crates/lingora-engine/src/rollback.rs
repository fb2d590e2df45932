// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Rollback workflow: restore an archived version to live.
//!
//! Replays a version's recovery backup over the content tables, then flips
//! the version back to live. Steps, in strict order:
//!
//! 1. `validate-target` - fatal unless the version is exactly `archived`
//! 2. `fetch-backup` - fatal when `{V}/backup.gz` is absent
//! 3. `decode-backup` - fatal on malformed data
//! 4. `clear-content` - delete all translations, then all languages
//! 5. `restore-languages` - first locale in backup order becomes the default
//! 6. `restore-translations` - batch upserts
//! 7. `promote-version`
//!
//! Steps 4-6 are a destructive full replace, not a diff. They do not run in
//! one transaction: a crash between the wipe and the reinserts leaves the
//! dataset empty until the engine resumes the failed step. Every step is
//! idempotent (the wipe repeats harmlessly, restores are upserts), so
//! resuming always converges. Readers during this window may observe an
//! empty or partially restored dataset.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use tracing::info;

use lingora_codec::BackupRow;
use lingora_core::artifacts::backup_path;
use lingora_core::{ArtifactStore, Persistence, TranslationRow, VersionStatus};

use crate::error::{Result, StepFailure};
use crate::step::{StepRunner, WorkflowPolicies};

/// Rows per insert statement, sized to the storage layer's batch limits.
const INSERT_BATCH_SIZE: usize = 25;

/// Result of a completed rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackOutcome {
    /// The version that went live again.
    pub version_id: i64,
    /// Locales restored from the backup, default first.
    pub locales: Vec<String>,
    /// Number of translation rows restored.
    pub translations: usize,
}

/// Restores an archived version from its recovery backup.
pub struct RollbackWorkflow {
    persistence: Arc<dyn Persistence>,
    artifacts: Arc<dyn ArtifactStore>,
    policies: WorkflowPolicies,
}

impl RollbackWorkflow {
    /// Create a rollback workflow with default step policies.
    pub fn new(persistence: Arc<dyn Persistence>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self::with_policies(persistence, artifacts, WorkflowPolicies::default())
    }

    /// Create a rollback workflow with explicit step policies.
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

    /// Run the workflow to completion on the given step runner.
    pub async fn run(&self, runner: &StepRunner, version_id: i64) -> Result<RollbackOutcome> {
        let target = runner
            .run("validate-target", &self.policies.metadata, || async {
                let version = self
                    .persistence
                    .get_version(version_id)
                    .await?
                    .ok_or_else(|| StepFailure::Fatal(format!("version {version_id} not found")))?;

                if version.status != VersionStatus::Archived.as_str() {
                    return Err(StepFailure::Fatal(format!(
                        "version {} has status '{}'; only archived versions can be rolled back",
                        version.id, version.status
                    )));
                }

                Ok(version)
            })
            .await?;

        info!(version_id = target.id, "Rolling back to archived version");

        // Checkpoint state is JSON, so the raw blob travels base64-encoded.
        let backup = runner
            .run("fetch-backup", &self.policies.bulk, || async {
                let path = backup_path(version_id);
                let bytes = self.artifacts.get(&path).await?.ok_or_else(|| {
                    StepFailure::Fatal(format!(
                        "version {version_id} has no backup artifact and cannot be rolled back"
                    ))
                })?;
                Ok(general_purpose::STANDARD.encode(bytes))
            })
            .await?;

        let groups = runner
            .run("decode-backup", &self.policies.metadata, || async {
                let bytes = general_purpose::STANDARD
                    .decode(backup.as_bytes())
                    .map_err(|e| {
                        StepFailure::Fatal(format!("corrupt checkpointed backup state: {e}"))
                    })?;
                let groups = lingora_codec::decode_backup(&bytes).map_err(|e| {
                    StepFailure::Fatal(format!("malformed backup for version {version_id}: {e}"))
                })?;
                // Older backups carry empty groups for row-less languages.
                Ok(lingora_codec::filter_legacy_groups(groups))
            })
            .await?;

        runner
            .run("clear-content", &self.policies.bulk, || async {
                self.persistence.delete_all_translations().await?;
                self.persistence.delete_all_languages().await?;
                Ok(())
            })
            .await?;

        let locales = runner
            .run("restore-languages", &self.policies.bulk, || async {
                let locales = distinct_locales(&groups);
                for (index, locale) in locales.iter().enumerate() {
                    // The backup format does not record which locale was
                    // default; the first in backup order takes the slot.
                    self.persistence
                        .insert_language(locale, index == 0)
                        .await?;
                }
                Ok(locales)
            })
            .await?;

        let translations = runner
            .run("restore-translations", &self.policies.bulk, || async {
                let rows: Vec<TranslationRow> =
                    groups.iter().flatten().map(to_translation_row).collect();
                for batch in rows.chunks(INSERT_BATCH_SIZE) {
                    self.persistence.insert_translations(batch).await?;
                }
                Ok(rows.len())
            })
            .await?;

        runner
            .run("promote-version", &self.policies.metadata, || async {
                Ok(self.persistence.promote_version(version_id).await?)
            })
            .await?;

        info!(version_id, translations, "Rollback complete");

        Ok(RollbackOutcome {
            version_id,
            locales,
            translations,
        })
    }
}

/// Distinct locales in first-encounter order across all backup rows.
fn distinct_locales(groups: &[Vec<BackupRow>]) -> Vec<String> {
    let mut locales: Vec<String> = Vec::new();
    for row in groups.iter().flatten() {
        if !locales.iter().any(|locale| locale == &row.language) {
            locales.push(row.language.clone());
        }
    }
    locales
}

fn to_translation_row(row: &BackupRow) -> TranslationRow {
    TranslationRow {
        key: row.key.clone(),
        language: row.language.clone(),
        value: row.value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, language: &str, value: &str) -> BackupRow {
        BackupRow {
            key: key.to_string(),
            language: language.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_distinct_locales_preserves_backup_order() {
        let groups = vec![
            vec![row("a", "en", "A"), row("b", "en", "B")],
            vec![row("a", "fr", "Ah")],
            vec![row("a", "de", "Ach")],
        ];

        assert_eq!(distinct_locales(&groups), vec!["en", "fr", "de"]);
    }

    #[test]
    fn test_distinct_locales_tolerates_mixed_groups() {
        let groups = vec![vec![row("a", "en", "A"), row("a", "fr", "Ah")]];
        assert_eq!(distinct_locales(&groups), vec!["en", "fr"]);
    }

    #[test]
    fn test_distinct_locales_empty() {
        assert!(distinct_locales(&[]).is_empty());
    }
}
