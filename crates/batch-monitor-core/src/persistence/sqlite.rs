// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed metadata store.
//!
//! Each attribute is its own row in `metadata_fields`, keyed by
//! `(partition_key, sort_key, field)` and holding the JSON-encoded value.
//! Updates upsert only the rows of the fields they carry, so concurrent
//! writers of disjoint field sets never clobber each other and the last
//! write of any single field wins.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::debug;

use crate::error::StoreError;
use crate::record::{MetadataAttributes, MetadataRecord, RecordKey};

use super::MetadataStore;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a store from an existing pool. Migrations are not run.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite URL and run migrations.
    ///
    /// Creates the parent directory of a file-backed database if needed.
    /// In-memory databases are per-connection, so the pool is limited to a
    /// single connection for them.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        if let Some(file) = database_file(url) {
            create_parent_dir(&file)?;
        }

        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {}: {}", url, e),
            })?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create and initialize a store from a file path.
    ///
    /// Creates parent directories and the database file if needed, then runs
    /// migrations.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let url = format!("sqlite:{}?mode=rwc", path.as_ref().to_string_lossy());
        Self::connect(&url).await
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// The file behind a SQLite URL, or `None` for in-memory databases.
fn database_file(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();

    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    Some(PathBuf::from(path))
}

fn create_parent_dir(file: &Path) -> Result<(), StoreError> {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })
        }
        _ => Ok(()),
    }
}

fn encode_fields(attributes: &MetadataAttributes) -> Result<Vec<(String, String)>, StoreError> {
    let fields = attributes.to_fields().map_err(|e| StoreError::InvalidField {
        field: "*".to_string(),
        details: e.to_string(),
    })?;

    fields
        .into_iter()
        .map(|(name, value)| {
            serde_json::to_string(&value)
                .map(|encoded| (name.clone(), encoded))
                .map_err(|e| StoreError::InvalidField {
                    field: name,
                    details: e.to_string(),
                })
        })
        .collect()
}

fn decode_fields(rows: Vec<(String, String)>) -> Result<MetadataAttributes, StoreError> {
    let mut fields = Map::new();
    for (name, encoded) in rows {
        let value: Value =
            serde_json::from_str(&encoded).map_err(|e| StoreError::InvalidField {
                field: name.clone(),
                details: e.to_string(),
            })?;
        fields.insert(name, value);
    }

    MetadataAttributes::from_fields(fields).map_err(|e| StoreError::InvalidField {
        field: "*".to_string(),
        details: e.to_string(),
    })
}

#[async_trait::async_trait]
impl MetadataStore for SqliteStore {
    async fn get_item(&self, key: &RecordKey) -> Result<Option<MetadataRecord>, StoreError> {
        let exists: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT 1
            FROM metadata_records
            WHERE partition_key = ? AND sort_key = ?
            "#,
        )
        .bind(key.partition_key.as_str())
        .bind(key.sort_key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if exists.is_none() {
            return Ok(None);
        }

        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT field, value
            FROM metadata_fields
            WHERE partition_key = ? AND sort_key = ?
            "#,
        )
        .bind(key.partition_key.as_str())
        .bind(key.sort_key.as_str())
        .fetch_all(&self.pool)
        .await?;

        let attributes = decode_fields(rows)?;
        Ok(Some(MetadataRecord::new(key.clone(), attributes)))
    }

    async fn put_item(&self, record: &MetadataRecord) -> Result<(), StoreError> {
        let fields = encode_fields(&record.attributes)?;
        let key = &record.key;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO metadata_records (partition_key, sort_key)
            VALUES (?, ?)
            ON CONFLICT (partition_key, sort_key)
            DO UPDATE SET updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key.partition_key.as_str())
        .bind(key.sort_key.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM metadata_fields
            WHERE partition_key = ? AND sort_key = ?
            "#,
        )
        .bind(key.partition_key.as_str())
        .bind(key.sort_key.as_str())
        .execute(&mut *tx)
        .await?;

        for (field, value) in &fields {
            sqlx::query(
                r#"
                INSERT INTO metadata_fields (partition_key, sort_key, field, value)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(key.partition_key.as_str())
            .bind(key.sort_key.as_str())
            .bind(field.as_str())
            .bind(value.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(key = %key, fields = fields.len(), "Record replaced");
        Ok(())
    }

    async fn update_item(
        &self,
        key: &RecordKey,
        attributes: &MetadataAttributes,
    ) -> Result<(), StoreError> {
        let fields = encode_fields(attributes)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO metadata_records (partition_key, sort_key)
            VALUES (?, ?)
            ON CONFLICT (partition_key, sort_key)
            DO UPDATE SET updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key.partition_key.as_str())
        .bind(key.sort_key.as_str())
        .execute(&mut *tx)
        .await?;

        for (field, value) in &fields {
            sqlx::query(
                r#"
                INSERT INTO metadata_fields (partition_key, sort_key, field, value)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (partition_key, sort_key, field)
                DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(key.partition_key.as_str())
            .bind(key.sort_key.as_str())
            .bind(field.as_str())
            .bind(value.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(key = %key, fields = fields.len(), "Record fields updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Platform;

    async fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::from_path(dir.path().join("nested/metadata.db"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_from_path_creates_parent_dirs() {
        let (dir, _store) = temp_store().await;
        assert!(dir.path().join("nested/metadata.db").exists());
    }

    #[tokio::test]
    async fn test_connect_creates_data_dir_for_default_style_url() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join(".data/batch-monitor.db");
        assert!(!dir.path().join(".data").exists());

        let url = format!("sqlite:{}?mode=rwc", db.display());
        let store = SqliteStore::connect(&url).await.unwrap();

        assert!(db.exists());
        assert!(
            store
                .get_item(&RecordKey::job("job-1"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_database_file_from_url() {
        assert_eq!(
            database_file(crate::config::DEFAULT_DATABASE_URL),
            Some(PathBuf::from(".data/batch-monitor.db"))
        );
        assert_eq!(
            database_file("sqlite:///var/lib/monitor/db.sqlite"),
            Some(PathBuf::from("/var/lib/monitor/db.sqlite"))
        );
        assert_eq!(database_file("sqlite::memory:"), None);
        assert_eq!(database_file("sqlite://:memory:?cache=shared"), None);
        assert_eq!(database_file("postgres://localhost/db"), None);
    }

    #[tokio::test]
    async fn test_connect_in_memory_creates_nothing() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        assert!(
            store
                .get_item(&RecordKey::job("job-1"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_get_missing_record() {
        let (_dir, store) = temp_store().await;
        assert!(
            store
                .get_item(&RecordKey::job("job-404"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_put_then_get_preserves_types() {
        let (_dir, store) = temp_store().await;
        let record = MetadataRecord::new(
            RecordKey::job("job-1"),
            MetadataAttributes {
                platform: Some(Platform::Ec2),
                started_at: Some(1700000000000),
                cpu: Some("2".to_string()),
                ..Default::default()
            },
        );

        store.put_item(&record).await.unwrap();

        let loaded = store.get_item(&record.key).await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_update_is_field_scoped() {
        let (_dir, store) = temp_store().await;
        let key = RecordKey::job("job-2");

        store
            .update_item(
                &key,
                &MetadataAttributes {
                    platform: Some(Platform::Fargate),
                    started_at: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .update_item(
                &key,
                &MetadataAttributes {
                    status: Some("SUCCEEDED".to_string()),
                    stopped_at: Some(9),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = store.get_item(&key).await.unwrap().unwrap();
        assert_eq!(record.attributes.platform, Some(Platform::Fargate));
        assert_eq!(record.attributes.started_at, Some(5));
        assert_eq!(record.attributes.status.as_deref(), Some("SUCCEEDED"));
        assert_eq!(record.attributes.stopped_at, Some(9));
    }

    #[tokio::test]
    async fn test_put_replaces_previous_fields() {
        let (_dir, store) = temp_store().await;
        let key = RecordKey::registered_instance("arn:ci/1");

        store
            .put_item(&MetadataRecord::new(
                key.clone(),
                MetadataAttributes {
                    os: Some("linux".to_string()),
                    ..Default::default()
                },
            ))
            .await
            .unwrap();
        store
            .put_item(&MetadataRecord::new(
                key.clone(),
                MetadataAttributes {
                    arch: Some("arm64".to_string()),
                    ..Default::default()
                },
            ))
            .await
            .unwrap();

        let record = store.get_item(&key).await.unwrap().unwrap();
        assert_eq!(record.attributes.os, None);
        assert_eq!(record.attributes.arch.as_deref(), Some("arm64"));
    }

    #[tokio::test]
    async fn test_in_memory_url() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let key = RecordKey::job("job-mem");

        store
            .update_item(
                &key,
                &MetadataAttributes {
                    status: Some("RUNNING".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = store.get_item(&key).await.unwrap().unwrap();
        assert_eq!(record.attributes.status.as_deref(), Some("RUNNING"));
    }
}
