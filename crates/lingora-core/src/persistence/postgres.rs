// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed persistence implementation.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::CoreError;

use super::{
    CheckpointRecord, InstanceRecord, InstanceStatus, LanguageRecord, Persistence, TranslationRow,
    VersionRecord, VersionStatus,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/postgres");

/// PostgreSQL-backed persistence provider.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Create a new Postgres persistence provider from an existing pool.
    ///
    /// The caller is responsible for running migrations on the pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the given database URL and run all migrations.
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to connect to PostgreSQL: {}", e),
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
impl Persistence for PostgresPersistence {
    async fn create_version(
        &self,
        description: Option<&str>,
        created_by: Option<&str>,
    ) -> Result<VersionRecord, CoreError> {
        let record = sqlx::query_as::<_, VersionRecord>(
            r#"
            INSERT INTO versions (description, status, created_at, created_by)
            VALUES ($1, 'draft', NOW(), $2)
            RETURNING id, description, status, created_at, created_by
            "#,
        )
        .bind(description)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_version(&self, version_id: i64) -> Result<Option<VersionRecord>, CoreError> {
        let record = sqlx::query_as::<_, VersionRecord>(
            r#"
            SELECT id, description, status, created_at, created_by
            FROM versions
            WHERE id = $1
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
                    WHERE status = $1
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

        let result = sqlx::query("UPDATE versions SET status = 'live' WHERE id = $1")
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
            VALUES ($1, $2)
            ON CONFLICT (locale) DO UPDATE SET is_default = EXCLUDED.is_default
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
            WHERE language = $1
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
            VALUES ($1, $2, $3)
            ON CONFLICT (key, language) DO UPDATE SET value = EXCLUDED.value
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
        builder.push(" ON CONFLICT (key, language) DO UPDATE SET value = EXCLUDED.value");

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
            VALUES ($1, $2, $3, 'pending', NOW())
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
            WHERE instance_id = $1
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
                SET status = $1, started_at = $2
                WHERE instance_id = $3
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
                SET status = $1
                WHERE instance_id = $2
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
            SET status = $1, output = $2, error = $3, finished_at = NOW()
            WHERE instance_id = $4
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
            VALUES ($1, $2, $3, NOW())
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
            WHERE instance_id = $1 AND checkpoint_id = $2
            "#,
        )
        .bind(instance_id)
        .bind(checkpoint_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to get a test database pool. Tests are skipped when
    // TEST_DATABASE_URL is not set.
    async fn test_store() -> Option<PostgresPersistence> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = PgPool::connect(&url).await.ok()?;
        MIGRATOR.run(&pool).await.ok()?;
        Some(PostgresPersistence::new(pool))
    }

    #[tokio::test]
    async fn test_version_lifecycle() {
        let Some(store) = test_store().await else {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        };

        let v1 = store
            .create_version(Some("pg test"), None)
            .await
            .expect("Failed to create version");
        assert_eq!(v1.status, "draft");

        store.promote_version(v1.id).await.unwrap();
        let v1 = store.get_version(v1.id).await.unwrap().unwrap();
        assert_eq!(v1.status, "live");
    }

    #[tokio::test]
    async fn test_checkpoint_first_write_wins() {
        let Some(store) = test_store().await else {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        };

        let instance_id = format!("pg-test-{}", Utc::now().timestamp_nanos_opt().unwrap_or(0));
        store
            .register_instance(&instance_id, "release", "{}")
            .await
            .unwrap();

        store
            .save_checkpoint(&instance_id, "step", b"first")
            .await
            .unwrap();
        store
            .save_checkpoint(&instance_id, "step", b"second")
            .await
            .unwrap();

        let checkpoint = store
            .load_checkpoint(&instance_id, "step")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.state, b"first");
    }
}
