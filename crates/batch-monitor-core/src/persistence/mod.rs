// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Metadata store interface and backends.
//!
//! The engine needs three operations from the store:
//!
//! | Operation | Semantics |
//! |-----------|-----------|
//! | `get_item` | Read a record by composite key |
//! | `put_item` | Create or replace a whole record |
//! | `update_item` | Set the given fields, creating the record if absent; other fields are untouched |
//!
//! `update_item` must be field-scoped: two writers updating disjoint field
//! sets of the same record must both survive regardless of interleaving.

pub mod memory;
pub mod sqlite;

pub use self::memory::InMemoryStore;
pub use self::sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::{MetadataAttributes, MetadataRecord, RecordKey};

/// Persistence interface used by the merge engine.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Read a record.
    async fn get_item(&self, key: &RecordKey) -> Result<Option<MetadataRecord>, StoreError>;

    /// Create or replace a record.
    async fn put_item(&self, record: &MetadataRecord) -> Result<(), StoreError>;

    /// Set the fields present in `fields` on the record at `key`.
    async fn update_item(
        &self,
        key: &RecordKey,
        fields: &MetadataAttributes,
    ) -> Result<(), StoreError>;
}
