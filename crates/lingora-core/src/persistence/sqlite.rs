// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed persistence implementation.

use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::CoreError;

use super::{
    CheckpointRecord, InstanceRecord, InstanceStatus, LanguageRecord, Persistence, TranslationRow,
    VersionRecord, VersionStatus,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing pool.
    ///
    /// The caller is responsible for running migrations on the pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create and initialize a new SQLite persistence from a file path.
    ///
    /// This convenience constructor handles all setup:
    /// - Creates parent directories if they don't exist
    /// - Creates the database file if it doesn't exist
    /// - Connects to the database with sensible defaults
    /// - Runs all migrations
    ///
    /// # Example
    ///
    /// ```ignore
    /// let persistence = SqlitePersistence::from_path(".data/lingora.db").await?;
    /// ```
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::DatabaseError {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let path_str = path.to_string_lossy();
        let url = format!("sqlite:{}?mode=rwc", path_str);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {:?}: {}", path, e),
            })?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "migrate".to_string(),
                details: format!("Failed to run migrations: {}", e),
            })?;

        Ok(Self { pool })
    }

    /// Create and initialize an in-memory SQLite persistence.
    ///
    /// The database lives as long as the returned pool. Useful for embedded
    /// deployments and tests.
    pub async fn in_memory() -> Result<Self, CoreError> {
        // A single connection: each in-memory connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to create in-memory SQLite database: {}", e),
            })?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "migrate".to_string(),
                details: format!("Failed to run migrations: {}", e),
            })?;

        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    async fn create_version(
        &self,
        description: Option<&str>,
        created_by: Option<&str>,
    ) -> Result<VersionRecord, CoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO versions (description, status, created_at, created_by)
            VALUES (?, 'draft', CURRENT_TIMESTAMP, ?)
            "#,
        )
        .bind(description)
        .bind(created_by)
        .execute(&self.pool)
        .await?;

        let version_id = result.last_insert_rowid();
        self.get_version(version_id)
            .await?
            .ok_or(CoreError::VersionNotFound { version_id })
    }

    async fn get_version(&self, version_id: i64) -> Result<Option<VersionRecord>, CoreError> {
        let record = sqlx::query_as::<_, VersionRecord>(
            r#"
            SELECT id, description, status, created_at, created_by
            FROM versions
            WHERE id = ?
            "#,
        )
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_latest_version(
        &self,
        status: Option<VersionStatus>,
    ) -> Result<Option<VersionRecord>, CoreError> {
        let record = match status {
            Some(status) => {
                sqlx::query_as::<_, VersionRecord>(
                    r#"
                    SELECT id, description, status, created_at, created_by
                    FROM versions
                    WHERE status = ?
                    ORDER BY id DESC
                    LIMIT 1
                    "#,
                )
                .bind(status.as_str())
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, VersionRecord>(
                    r#"
                    SELECT id, description, status, created_at, created_by
                    FROM versions
                    ORDER BY id DESC
                    LIMIT 1
                    "#,
                )
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(record)
    }

    async fn list_versions(&self) -> Result<Vec<VersionRecord>, CoreError> {
        let records = sqlx::query_as::<_, VersionRecord>(
            r#"
            SELECT id, description, status, created_at, created_by
            FROM versions
            ORDER BY id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn promote_version(&self, version_id: i64) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE versions SET status = 'archived' WHERE status = 'live'")
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("UPDATE versions SET status = 'live' WHERE id = ?")
            .bind(version_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back the archive half.
            return Err(CoreError::VersionNotFound { version_id });
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_languages(&self) -> Result<Vec<LanguageRecord>, CoreError> {
        let records = sqlx::query_as::<_, LanguageRecord>(
            r#"
            SELECT locale, is_default
            FROM languages
            ORDER BY is_default DESC, locale ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn insert_language(&self, locale: &str, is_default: bool) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO languages (locale, is_default)
            VALUES (?, ?)
            ON CONFLICT (locale) DO UPDATE SET is_default = excluded.is_default
            "#,
        )
        .bind(locale)
        .bind(is_default)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_all_languages(&self) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM languages")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_translations(&self, locale: &str) -> Result<Vec<TranslationRow>, CoreError> {
        let records = sqlx::query_as::<_, TranslationRow>(
            r#"
            SELECT key, language, value
            FROM translations
            WHERE language = ?
            ORDER BY key ASC
            "#,
        )
        .bind(locale)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn upsert_translation(&self, row: &TranslationRow) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO translations (key, language, value)
            VALUES (?, ?, ?)
            ON CONFLICT (key, language) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(&row.key)
        .bind(&row.language)
        .bind(&row.value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_translations(&self, rows: &[TranslationRow]) -> Result<(), CoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut builder =
            sqlx::QueryBuilder::new("INSERT INTO translations (key, language, value) ");
        builder.push_values(rows, |mut b, row| {
            b.push_bind(&row.key)
                .push_bind(&row.language)
                .push_bind(&row.value);
        });
        builder.push(" ON CONFLICT (key, language) DO UPDATE SET value = excluded.value");

        builder.build().execute(&self.pool).await?;

        Ok(())
    }

    async fn delete_all_translations(&self) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM translations")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn register_instance(
        &self,
        instance_id: &str,
        kind: &str,
        payload: &str,
    ) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO instances (instance_id, kind, payload, status, created_at)
            VALUES (?, ?, ?, 'pending', CURRENT_TIMESTAMP)
            "#,
        )
        .bind(instance_id)
        .bind(kind)
        .bind(payload)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(CoreError::InstanceAlreadyExists {
                    instance_id: instance_id.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_instance(&self, instance_id: &str) -> Result<Option<InstanceRecord>, CoreError> {
        let record = sqlx::query_as::<_, InstanceRecord>(
            r#"
            SELECT instance_id, kind, payload, status, error, output,
                   created_at, started_at, finished_at
            FROM instances
            WHERE instance_id = ?
            "#,
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update_instance_status(
        &self,
        instance_id: &str,
        status: InstanceStatus,
        started_at: Option<DateTime<Utc>>,
    ) -> Result<(), CoreError> {
        if let Some(started) = started_at {
            sqlx::query(
                r#"
                UPDATE instances
                SET status = ?, started_at = ?
                WHERE instance_id = ?
                "#,
            )
            .bind(status.as_str())
            .bind(started)
            .bind(instance_id)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE instances
                SET status = ?
                WHERE instance_id = ?
                "#,
            )
            .bind(status.as_str())
            .bind(instance_id)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn complete_instance(
        &self,
        instance_id: &str,
        output: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), CoreError> {
        let status = if error.is_some() {
            InstanceStatus::Failed
        } else {
            InstanceStatus::Completed
        };

        sqlx::query(
            r#"
            UPDATE instances
            SET status = ?, output = ?, error = ?, finished_at = CURRENT_TIMESTAMP
            WHERE instance_id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(output)
        .bind(error)
        .bind(instance_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
        state: &[u8],
    ) -> Result<(), CoreError> {
        // The first committed state wins: a step re-run after a crash must
        // observe the result the original run checkpointed.
        sqlx::query(
            r#"
            INSERT INTO checkpoints (instance_id, checkpoint_id, state, created_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT (instance_id, checkpoint_id) DO NOTHING
            "#,
        )
        .bind(instance_id)
        .bind(checkpoint_id)
        .bind(state)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_checkpoint(
        &self,
        instance_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<CheckpointRecord>, CoreError> {
        let record = sqlx::query_as::<_, CheckpointRecord>(
            r#"
            SELECT id, instance_id, checkpoint_id, state, created_at
            FROM checkpoints
            WHERE instance_id = ? AND checkpoint_id = ?
            "#,
        )
        .bind(instance_id)
        .bind(checkpoint_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}
