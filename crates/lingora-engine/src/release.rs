// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Release workflow: publish the current draft version.
//!
//! Turns the mutable draft into immutable artifacts, then flips the draft to
//! live. Steps, in strict order:
//!
//! 1. `get-draft-version` - fatal when nothing is drafted
//! 2. `get-languages` - fatal when no default language is configured
//! 3. `fetch-default-translations`
//! 4. `fetch-translations-{locale}` - one step per other language, fanned out
//! 5. `render-snapshots` - non-default locales overlay the default map
//! 6. `persist-snapshots` - parallel artifact writes
//! 7. `persist-backup` - raw rows, gzip, `{versionId}/backup.gz`
//! 8. `promote-version`
//!
//! Promotion runs only after steps 6 and 7 are durably checkpointed. This
//! ordering is the core correctness guarantee: the public read path trusts
//! that a live version id implies its artifacts exist, so a version must
//! never become live before they do. A failed release leaves the draft a
//! draft and changes nothing public.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::info;

use lingora_codec::BackupRow;
use lingora_core::artifacts::{backup_path, snapshot_path};
use lingora_core::{
    ArtifactStore, LanguageRecord, Persistence, PutOptions, TranslationRow, VersionStatus,
};

use crate::error::{Result, StepFailure};
use crate::step::{StepRunner, WorkflowPolicies};

/// Result of a completed release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseOutcome {
    /// The version that went live.
    pub version_id: i64,
    /// Locales a snapshot was published for.
    pub locales: Vec<String>,
}

/// Languages split into the default language and everything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LanguagePartition {
    default_language: LanguageRecord,
    other_languages: Vec<LanguageRecord>,
}

/// An in-memory snapshot file awaiting persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotFile {
    path: String,
    content: String,
}

/// Publishes the current draft version.
pub struct ReleaseWorkflow {
    persistence: Arc<dyn Persistence>,
    artifacts: Arc<dyn ArtifactStore>,
    policies: WorkflowPolicies,
}

impl ReleaseWorkflow {
    /// Create a release workflow with default step policies.
    pub fn new(persistence: Arc<dyn Persistence>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self::with_policies(persistence, artifacts, WorkflowPolicies::default())
    }

    /// Create a release workflow with explicit step policies.
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
    pub async fn run(&self, runner: &StepRunner) -> Result<ReleaseOutcome> {
        let draft = runner
            .run("get-draft-version", &self.policies.metadata, || async {
                self.persistence
                    .get_latest_version(Some(VersionStatus::Draft))
                    .await?
                    .ok_or_else(|| StepFailure::Fatal("no draft version to publish".to_string()))
            })
            .await?;

        info!(version_id = draft.id, "Publishing draft version");

        let languages = runner
            .run("get-languages", &self.policies.metadata, || async {
                let all = self.persistence.get_languages().await?;
                partition_languages(all).ok_or_else(|| {
                    StepFailure::Fatal("no default language configured".to_string())
                })
            })
            .await?;

        let default_rows = runner
            .run(
                "fetch-default-translations",
                &self.policies.metadata,
                || async {
                    Ok(self
                        .persistence
                        .get_translations(&languages.default_language.locale)
                        .await?)
                },
            )
            .await?;

        // Per-language fetches are independent steps, fanned out and joined
        // before rendering begins.
        let fetches = languages.other_languages.iter().map(|language| {
            let step_name = format!("fetch-translations-{}", language.locale);
            async move {
                runner
                    .run(&step_name, &self.policies.metadata, || async {
                        Ok(self.persistence.get_translations(&language.locale).await?)
                    })
                    .await
            }
        });
        let other_rows: Vec<Vec<TranslationRow>> = try_join_all(fetches).await?;

        let files = runner
            .run("render-snapshots", &self.policies.metadata, || async {
                render_snapshots(draft.id, &languages, &default_rows, &other_rows)
            })
            .await?;

        runner
            .run("persist-snapshots", &self.policies.bulk, || async {
                let options = PutOptions::immutable_json();
                let writes = files.iter().map(|file| {
                    let options = &options;
                    async move {
                        self.artifacts
                            .put(&file.path, file.content.as_bytes(), options)
                            .await
                    }
                });
                try_join_all(writes).await?;
                Ok(())
            })
            .await?;

        runner
            .run("persist-backup", &self.policies.bulk, || async {
                let groups = backup_groups(&default_rows, &other_rows);
                let bytes = lingora_codec::encode_backup(&groups)
                    .map_err(|e| StepFailure::Fatal(format!("failed to encode backup: {e}")))?;
                self.artifacts
                    .put(&backup_path(draft.id), &bytes, &PutOptions::backup())
                    .await?;
                Ok(())
            })
            .await?;

        // Promotion is last by construction: it must never run before every
        // artifact write above has durably succeeded.
        runner
            .run("promote-version", &self.policies.metadata, || async {
                Ok(self.persistence.promote_version(draft.id).await?)
            })
            .await?;

        let locales = published_locales(&languages);
        info!(
            version_id = draft.id,
            locales = locales.len(),
            "Draft version is live"
        );

        Ok(ReleaseOutcome {
            version_id: draft.id,
            locales,
        })
    }
}

/// Split languages into the default one and the rest. `None` when no
/// language is marked default.
fn partition_languages(all: Vec<LanguageRecord>) -> Option<LanguagePartition> {
    let mut default_language = None;
    let mut other_languages = Vec::new();

    for language in all {
        if language.is_default && default_language.is_none() {
            default_language = Some(language);
        } else {
            other_languages.push(language);
        }
    }

    Some(LanguagePartition {
        default_language: default_language?,
        other_languages,
    })
}

fn published_locales(languages: &LanguagePartition) -> Vec<String> {
    std::iter::once(languages.default_language.locale.clone())
        .chain(
            languages
                .other_languages
                .iter()
                .map(|language| language.locale.clone()),
        )
        .collect()
}

/// Build one snapshot file per language.
///
/// The default language publishes its own map. Every other language starts
/// from the default map and overlays its own pairs: a key missing in a
/// non-default locale falls back to the default locale's value in the
/// published snapshot, so the public endpoint never serves missing strings.
fn render_snapshots(
    version_id: i64,
    languages: &LanguagePartition,
    default_rows: &[TranslationRow],
    other_rows: &[Vec<TranslationRow>],
) -> std::result::Result<Vec<SnapshotFile>, StepFailure> {
    let default_map: BTreeMap<&str, &str> = default_rows
        .iter()
        .map(|row| (row.key.as_str(), row.value.as_str()))
        .collect();

    let mut files = Vec::with_capacity(other_rows.len() + 1);
    files.push(snapshot_file(
        version_id,
        &languages.default_language.locale,
        default_map.clone(),
    )?);

    for (language, rows) in languages.other_languages.iter().zip(other_rows) {
        let mut map = default_map.clone();
        for row in rows {
            map.insert(row.key.as_str(), row.value.as_str());
        }
        files.push(snapshot_file(version_id, &language.locale, map)?);
    }

    Ok(files)
}

fn snapshot_file(
    version_id: i64,
    locale: &str,
    map: BTreeMap<&str, &str>,
) -> std::result::Result<SnapshotFile, StepFailure> {
    let bytes = lingora_codec::encode_locale_snapshot(map)
        .map_err(|e| StepFailure::Fatal(format!("failed to encode snapshot for '{locale}': {e}")))?;
    let content = String::from_utf8(bytes).map_err(|e| {
        StepFailure::Fatal(format!("snapshot for '{locale}' is not valid UTF-8: {e}"))
    })?;

    Ok(SnapshotFile {
        path: snapshot_path(version_id, locale),
        content,
    })
}

/// Assemble the recovery row groups: the default language's raw rows first,
/// then each other language's raw rows. No fallback is applied - this is the
/// recovery format, distinct from the fallback-applied publish format.
fn backup_groups(
    default_rows: &[TranslationRow],
    other_rows: &[Vec<TranslationRow>],
) -> Vec<Vec<BackupRow>> {
    let mut groups = Vec::with_capacity(other_rows.len() + 1);
    groups.push(default_rows.iter().map(to_backup_row).collect());
    for rows in other_rows {
        groups.push(rows.iter().map(to_backup_row).collect());
    }
    groups
}

fn to_backup_row(row: &TranslationRow) -> BackupRow {
    BackupRow {
        key: row.key.clone(),
        language: row.language.clone(),
        value: row.value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn language(locale: &str, is_default: bool) -> LanguageRecord {
        LanguageRecord {
            locale: locale.to_string(),
            is_default,
        }
    }

    fn row(key: &str, language: &str, value: &str) -> TranslationRow {
        TranslationRow {
            key: key.to_string(),
            language: language.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_partition_languages() {
        let partition =
            partition_languages(vec![language("en", true), language("fr", false)]).unwrap();
        assert_eq!(partition.default_language.locale, "en");
        assert_eq!(partition.other_languages.len(), 1);

        assert!(partition_languages(vec![language("fr", false)]).is_none());
        assert!(partition_languages(vec![]).is_none());
    }

    #[test]
    fn test_render_snapshots_applies_fallback() {
        let languages = LanguagePartition {
            default_language: language("en", true),
            other_languages: vec![language("fr", false)],
        };
        let default_rows = vec![row("a", "en", "A"), row("b", "en", "B")];
        let other_rows = vec![vec![row("a", "fr", "Ah")]];

        let files = render_snapshots(3, &languages, &default_rows, &other_rows).unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "3/en.json");
        assert_eq!(files[0].content, r#"{"a":"A","b":"B"}"#);
        // "a" keeps the French value, "b" falls back to the default locale.
        assert_eq!(files[1].path, "3/fr.json");
        assert_eq!(files[1].content, r#"{"a":"Ah","b":"B"}"#);
    }

    #[test]
    fn test_backup_groups_keep_raw_rows() {
        let default_rows = vec![row("a", "en", "A"), row("b", "en", "B")];
        let other_rows = vec![vec![row("a", "fr", "Ah")]];

        let groups = backup_groups(&default_rows, &other_rows);

        // The fr group holds only the row fr actually has - no fallback.
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 1);
        assert_eq!(groups[1][0].value, "Ah");
    }
}
