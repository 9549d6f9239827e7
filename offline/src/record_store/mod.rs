//! Local Structured Store
//!
//! A single table of domain records (id → record). Written in bulk at
//! install, read one record at a time by the image fallback resolver.
//!
//! `replace_all` is all-or-nothing: the new table is fully built before it
//! replaces the live one, so a failing batch leaves the previous contents
//! untouched.

mod file;

pub use file::FileRecordStore;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use spin::RwLock;

use crate::config::fallback_asset_name;
use crate::error::StoreError;

/// A content item as delivered by the domain API.
///
/// Only `id` and `category` matter to the engine; every other field is
/// kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub id: i64,
    pub category: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DomainRecord {
    pub fn new(id: i64, category: impl Into<String>) -> Self {
        Self {
            id,
            category: category.into(),
            extra: serde_json::Map::new(),
        }
    }

    /// Name of the fallback asset for this record's category.
    pub fn fallback_name(&self) -> String {
        fallback_asset_name(&self.category)
    }
}

/// The record table.
pub type RecordTable = BTreeMap<i64, DomainRecord>;

/// Persisted key-value table of domain records.
pub trait RecordStore: Send + Sync {
    /// Atomically replace the whole table with `records`.
    ///
    /// Returns the number of records now stored.
    fn replace_all(&self, records: Vec<DomainRecord>) -> Result<usize, StoreError>;

    /// Look up one record. A miss is `StoreError::NotFound`.
    fn get(&self, id: i64) -> Result<DomainRecord, StoreError>;

    /// Number of stored records.
    fn count(&self) -> Result<usize, StoreError>;
}

/// Build a table from a batch, inserting in order.
///
/// Fails on the first record that cannot be inserted; nothing built so far
/// escapes.
pub(crate) fn build_table(records: Vec<DomainRecord>) -> Result<RecordTable, StoreError> {
    let mut table = RecordTable::new();
    for record in records {
        if record.category.trim().is_empty() {
            return Err(StoreError::InvalidRecord {
                id: record.id,
                reason: "empty category".into(),
            });
        }
        let id = record.id;
        if table.insert(id, record).is_some() {
            return Err(StoreError::DuplicateId { id });
        }
    }
    Ok(table)
}

/// In-memory record store.
///
/// The live table sits behind an `Arc`; `replace_all` swaps the reference
/// once the new table is complete.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    table: RwLock<Arc<RecordTable>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current table.
    pub fn snapshot(&self) -> Arc<RecordTable> {
        self.table.read().clone()
    }
}

impl RecordStore for MemoryRecordStore {
    fn replace_all(&self, records: Vec<DomainRecord>) -> Result<usize, StoreError> {
        let table = build_table(records)?;
        let count = table.len();
        *self.table.write() = Arc::new(table);
        log::debug!("[SW Store] Replaced table with {} records", count);
        Ok(count)
    }

    fn get(&self, id: i64) -> Result<DomainRecord, StoreError> {
        self.table
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { id })
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.table.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(ids: &[i64]) -> Vec<DomainRecord> {
        ids.iter()
            .map(|&id| DomainRecord::new(id, "Grocery"))
            .collect()
    }

    #[test]
    fn replace_and_get() {
        let store = MemoryRecordStore::new();
        assert_eq!(store.replace_all(records(&[1, 2, 3])).unwrap(), 3);
        assert_eq!(store.get(2).unwrap().category, "Grocery");
        assert!(matches!(store.get(9), Err(StoreError::NotFound { id: 9 })));
    }

    #[test]
    fn replace_drops_stale_records() {
        let store = MemoryRecordStore::new();
        store.replace_all(records(&[1, 2, 3])).unwrap();
        store.replace_all(records(&[3, 4])).unwrap();
        assert_eq!(store.count().unwrap(), 2);
        assert!(store.get(1).unwrap_err().is_not_found());
        assert!(store.get(4).is_ok());
    }

    #[test]
    fn failed_batch_keeps_prior_table() {
        let store = MemoryRecordStore::new();
        store.replace_all(records(&[10, 11])).unwrap();

        let err = store.replace_all(records(&[1, 2, 2, 3])).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { id: 2 }));
        assert_eq!(store.count().unwrap(), 2);
        assert!(store.get(10).is_ok());
        assert!(store.get(1).unwrap_err().is_not_found());
    }

    #[test]
    fn empty_category_rejected() {
        let store = MemoryRecordStore::new();
        let err = store
            .replace_all(vec![DomainRecord::new(1, "  ")])
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { id: 1, .. }));
    }

    #[test]
    fn snapshot_outlives_replace() {
        let store = MemoryRecordStore::new();
        store.replace_all(records(&[1])).unwrap();
        let before = store.snapshot();
        store.replace_all(records(&[2])).unwrap();
        assert!(before.contains_key(&1));
        assert!(!store.snapshot().contains_key(&1));
    }

    #[test]
    fn fallback_name_is_lower_cased() {
        let record = DomainRecord::new(42, "Dairy");
        assert_eq!(record.fallback_name(), "fallback-dairy");
    }

    #[test]
    fn extra_fields_are_kept() {
        let record: DomainRecord = serde_json::from_str(
            r#"{"id": 7, "category": "Produce", "name": "Apple", "price": 1.5}"#,
        )
        .unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.category, "Produce");
        assert_eq!(record.extra.get("name"), Some(&serde_json::json!("Apple")));
        assert_eq!(record.extra.len(), 2);
    }
}
