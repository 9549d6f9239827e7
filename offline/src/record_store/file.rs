//! File-backed record store.
//!
//! The table lives in one JSON file, `{dir}/records.json`. A validated
//! replacement table is written to a temp file and renamed over the live
//! file, so a failed `replace_all` never touches what is on disk.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use spin::RwLock;

use super::{build_table, DomainRecord, RecordStore, RecordTable};
use crate::error::StoreError;
use crate::persist::write_atomic;

/// Table file name.
const TABLE_FILE: &str = "records.json";

/// Record store persisted under a directory.
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    /// In-memory copy of the table on disk.
    table: RwLock<Arc<RecordTable>>,
    /// Serializes writers.
    write_lock: Mutex<()>,
}

impl FileRecordStore {
    /// Open the store under `dir`, creating the directory and an empty
    /// table if absent.
    ///
    /// Safe to call concurrently: the table file is created with
    /// `create_new`, so an existing table is never replaced by `open`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(TABLE_FILE);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(b"[]")?;
                log::debug!("[SW Store] Created record table at {}", path.display());
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        let table = Self::load(&path)?;
        Ok(Self {
            path,
            table: RwLock::new(Arc::new(table)),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the table file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<RecordTable, StoreError> {
        let bytes = fs::read(path)?;
        // A concurrent `open` may have created the file but not written it yet.
        if bytes.is_empty() {
            return Ok(RecordTable::new());
        }
        let records: Vec<DomainRecord> = serde_json::from_slice(&bytes)?;
        build_table(records)
    }
}

impl RecordStore for FileRecordStore {
    fn replace_all(&self, records: Vec<DomainRecord>) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock();
        let table = build_table(records)?;
        let rows: Vec<&DomainRecord> = table.values().collect();
        let json = serde_json::to_vec(&rows)?;
        write_atomic(&self.path, &json)?;

        let count = table.len();
        *self.table.write() = Arc::new(table);
        log::debug!(
            "[SW Store] Wrote {} records to {}",
            count,
            self.path.display()
        );
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
