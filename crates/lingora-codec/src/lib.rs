// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Snapshot and backup serialization for lingora.
//!
//! Two artifact formats are produced at release time:
//!
//! - **Publish snapshots** (`{versionId}/{locale}.json`): one canonical JSON
//!   object per locale mapping translation key to value. These are the files
//!   the public read path serves and the CDN caches, so encoding is
//!   deterministic (sorted keys): the same translation set always produces
//!   the same bytes.
//! - **Recovery backups** (`{versionId}/backup.gz`): one gzip-compressed JSON
//!   array of per-language arrays of raw `{key, language, value}` rows. This
//!   is the sole source of truth for rollback and carries enough information
//!   to rebuild the languages and translations tables.
//!
//! `decode_backup` is a faithful inverse of `encode_backup`, empty
//! per-language groups included. Backups written by older producers may
//! contain empty groups for languages that had no rows; callers run
//! [`filter_legacy_groups`] before reconstruction to drop them.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

/// Errors produced while encoding or decoding artifacts.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON serialization or parsing failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Gzip compression or decompression failed.
    #[error("gzip error: {0}")]
    Gzip(#[from] std::io::Error),
}

/// Result type using CodecError.
pub type Result<T> = std::result::Result<T, CodecError>;

/// One translation row as carried in a recovery backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRow {
    /// Translation key.
    pub key: String,
    /// Locale the row belongs to.
    pub language: String,
    /// Translated value.
    pub value: String,
}

/// Encode the publish snapshot for one locale.
///
/// Produces a canonical JSON object `{key: value, ...}` with keys in sorted
/// order, so re-encoding the same translation set is byte-stable regardless
/// of input order.
pub fn encode_locale_snapshot<'a, I>(translations: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let map: BTreeMap<&str, &str> = translations.into_iter().collect();
    Ok(serde_json::to_vec(&map)?)
}

/// Encode a recovery backup: serialize the per-language row groups to JSON,
/// then gzip.
pub fn encode_backup(groups: &[Vec<BackupRow>]) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(groups)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Decode a recovery backup: gunzip, then parse the per-language row groups.
///
/// This is the exact inverse of [`encode_backup`]; empty groups are preserved
/// as-is. Use [`filter_legacy_groups`] before reconstructing tables.
pub fn decode_backup(bytes: &[u8]) -> Result<Vec<Vec<BackupRow>>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json)?;

    Ok(serde_json::from_slice(&json)?)
}

/// Compatibility path for backups from older producers.
///
/// Early backup writers emitted an empty sub-array for every configured
/// language that had no translation rows yet. Those groups carry no locale
/// information and would break default-language reconstruction, so they are
/// dropped before the rollback workflow rebuilds the languages table.
pub fn filter_legacy_groups(groups: Vec<Vec<BackupRow>>) -> Vec<Vec<BackupRow>> {
    groups.into_iter().filter(|rows| !rows.is_empty()).collect()
}
