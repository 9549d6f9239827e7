//! Directory-backed tier storage.
//!
//! Layout under the root directory:
//!   - `{tier}/_meta.json` — key → entry metadata (file number, url, status, headers)
//!   - `{tier}/{n}.body`   — response body bytes
//!
//! Index and body writes go through temp-file + rename.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::CacheStorage;
use crate::error::CacheError;
use crate::fetch::Response;
use crate::persist::write_atomic;
use crate::tiers::is_valid_tier_name;

/// Index file name inside each tier directory.
const META_FILE: &str = "_meta.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct TierIndex {
    next_file: u64,
    entries: BTreeMap<String, EntryMeta>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    file: u64,
    url: String,
    status: u16,
    headers: BTreeMap<String, String>,
}

/// Tier storage persisted under a root directory.
#[derive(Debug)]
pub struct DirCacheStorage {
    root: PathBuf,
    /// Serializes index read-modify-write cycles.
    lock: Mutex<()>,
}

impl DirCacheStorage {
    /// Open (creating if needed) a storage rooted at `root`.
    pub fn open_root(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tier_dir(&self, tier: &str) -> Result<PathBuf, CacheError> {
        if !is_valid_tier_name(tier) {
            return Err(CacheError::InvalidData(format!("invalid tier name: {tier:?}")));
        }
        Ok(self.root.join(tier))
    }

    fn read_index(dir: &Path) -> Result<Option<TierIndex>, CacheError> {
        match fs::read(dir.join(META_FILE)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_index(dir: &Path, index: &TierIndex) -> Result<(), CacheError> {
        let json = serde_json::to_vec_pretty(index)?;
        write_atomic(&dir.join(META_FILE), &json)?;
        Ok(())
    }

    fn body_path(dir: &Path, file: u64) -> PathBuf {
        dir.join(format!("{file}.body"))
    }
}

impl CacheStorage for DirCacheStorage {
    fn open(&self, tier: &str) -> Result<(), CacheError> {
        let dir = self.tier_dir(tier)?;
        let _guard = self.lock.lock();
        fs::create_dir_all(&dir)?;
        if Self::read_index(&dir)?.is_none() {
            Self::write_index(&dir, &TierIndex::default())?;
        }
        Ok(())
    }

    fn has(&self, tier: &str) -> bool {
        self.tier_dir(tier)
            .map(|dir| dir.join(META_FILE).exists())
            .unwrap_or(false)
    }

    fn put(&self, tier: &str, key: &str, response: &Response) -> Result<(), CacheError> {
        let dir = self.tier_dir(tier)?;
        let _guard = self.lock.lock();
        fs::create_dir_all(&dir)?;
        let mut index = Self::read_index(&dir)?.unwrap_or_default();

        let file = match index.entries.get(key) {
            Some(meta) => meta.file,
            None => {
                let n = index.next_file;
                index.next_file += 1;
                n
            }
        };

        write_atomic(&Self::body_path(&dir, file), &response.body)?;
        index.entries.insert(
            key.to_string(),
            EntryMeta {
                file,
                url: response.url.clone(),
                status: response.status,
                headers: response.headers.clone(),
            },
        );
        Self::write_index(&dir, &index)
    }

    fn match_in(&self, tier: &str, key: &str) -> Result<Option<Response>, CacheError> {
        let dir = self.tier_dir(tier)?;
        let _guard = self.lock.lock();
        let Some(index) = Self::read_index(&dir)? else {
            return Ok(None);
        };
        let Some(meta) = index.entries.get(key) else {
            return Ok(None);
        };

        let body = fs::read(Self::body_path(&dir, meta.file))?;
        let mut response = Response::new(meta.status)
            .with_url(meta.url.clone())
            .with_body(body);
        response.headers = meta.headers.clone();
        Ok(Some(response))
    }

    fn delete(&self, tier: &str) -> Result<bool, CacheError> {
        let dir = self.tier_dir(tier)?;
        let _guard = self.lock.lock();
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)?;
        Ok(true)
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        let _guard = self.lock.lock();
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() && entry.path().join(META_FILE).exists() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn entry_count(&self, tier: &str) -> Result<usize, CacheError> {
        let dir = self.tier_dir(tier)?;
        let _guard = self.lock.lock();
        Self::read_index(&dir)?
            .map(|index| index.entries.len())
            .ok_or_else(|| CacheError::TierNotFound {
                tier: tier.to_string(),
            })
    }
}
