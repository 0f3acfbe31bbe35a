// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-process metadata store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::record::{MetadataAttributes, MetadataRecord, RecordKey};

use super::MetadataStore;

/// Map-backed store. Counts writes so callers can assert on them.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<RecordKey, MetadataRecord>>,
    writes: AtomicU64,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put_item` / `update_item` calls served.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of records held.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Copy of every record, for inspection.
    pub async fn snapshot(&self) -> Vec<MetadataRecord> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    async fn get_item(&self, key: &RecordKey) -> Result<Option<MetadataRecord>, StoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put_item(&self, record: &MetadataRecord) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.records
            .write()
            .await
            .insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn update_item(
        &self,
        key: &RecordKey,
        fields: &MetadataAttributes,
    ) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.records
            .write()
            .await
            .entry(key.clone())
            .or_insert_with(|| MetadataRecord::new(key.clone(), MetadataAttributes::default()))
            .apply_partial_update(fields);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_creates_missing_record() {
        let store = InMemoryStore::new();
        let key = RecordKey::job("job-1");

        store
            .update_item(
                &key,
                &MetadataAttributes {
                    status: Some("SUCCEEDED".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = store.get_item(&key).await.unwrap().unwrap();
        assert_eq!(record.attributes.status.as_deref(), Some("SUCCEEDED"));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_put_replaces_update_merges() {
        let store = InMemoryStore::new();
        let key = RecordKey::registered_instance("arn:ci/1");

        store
            .put_item(&MetadataRecord::new(
                key.clone(),
                MetadataAttributes {
                    os: Some("linux".to_string()),
                    cpu: Some("2048".to_string()),
                    ..Default::default()
                },
            ))
            .await
            .unwrap();
        store
            .update_item(
                &key,
                &MetadataAttributes {
                    cpu: Some("4096".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let merged = store.get_item(&key).await.unwrap().unwrap();
        assert_eq!(merged.attributes.os.as_deref(), Some("linux"));
        assert_eq!(merged.attributes.cpu.as_deref(), Some("4096"));

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

        let replaced = store.get_item(&key).await.unwrap().unwrap();
        assert_eq!(replaced.attributes.os, None);
        assert_eq!(replaced.attributes.arch.as_deref(), Some("arm64"));
        assert_eq!(store.write_count(), 3);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = InMemoryStore::new();
        assert!(store.get_item(&RecordKey::job("nope")).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }
}
