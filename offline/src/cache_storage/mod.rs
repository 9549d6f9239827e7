//! Cache Tier Storage
//!
//! Named caches of request-keyed responses. The engine addresses each tier
//! by name; entries are keyed by [`Request::cache_key`].
//!
//! [`MemoryCacheStorage`] keeps tiers in memory. [`DirCacheStorage`]
//! persists them under a root directory, one subdirectory per tier.
//!
//! [`Request::cache_key`]: crate::fetch::Request::cache_key

mod disk;

pub use disk::DirCacheStorage;

use std::collections::BTreeMap;

use bytes::Bytes;
use spin::RwLock;

use crate::error::CacheError;
use crate::fetch::Response;

/// Persisted cache tier storage.
///
/// Writers to the same key are serialized by the implementation; the last
/// write wins.
pub trait CacheStorage: Send + Sync {
    /// Create the tier if it does not exist.
    fn open(&self, tier: &str) -> Result<(), CacheError>;

    /// Whether the tier exists.
    fn has(&self, tier: &str) -> bool;

    /// Store `response` under `key`, creating the tier if needed.
    fn put(&self, tier: &str, key: &str, response: &Response) -> Result<(), CacheError>;

    /// Look up `key` in one tier. A missing tier is a miss.
    fn match_in(&self, tier: &str, key: &str) -> Result<Option<Response>, CacheError>;

    /// Delete a tier and every entry in it. Returns whether it existed.
    fn delete(&self, tier: &str) -> Result<bool, CacheError>;

    /// Names of all existing tiers, sorted.
    fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Number of entries in a tier.
    fn entry_count(&self, tier: &str) -> Result<usize, CacheError>;

    /// Look up `key` across all tiers (first hit in name order).
    fn match_any(&self, key: &str) -> Result<Option<Response>, CacheError> {
        for tier in self.keys()? {
            if let Some(response) = self.match_in(&tier, key)? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}

/// A single cached response.
#[derive(Debug, Clone)]
struct CachedResponse {
    url: String,
    status: u16,
    headers: BTreeMap<String, String>,
    body: Bytes,
    /// Size in bytes (body + header estimate).
    size: usize,
}

impl CachedResponse {
    fn from_response(response: &Response) -> Self {
        let header_size: usize = response
            .headers
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum();
        Self {
            url: response.url.clone(),
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.clone(),
            size: response.body.len() + header_size,
        }
    }

    fn to_response(&self) -> Response {
        let mut response = Response::new(self.status).with_url(self.url.clone());
        response.headers = self.headers.clone();
        response.body = self.body.clone();
        response
    }
}

/// One named tier.
#[derive(Debug, Clone, Default)]
struct Cache {
    /// key -> entry
    entries: BTreeMap<String, CachedResponse>,
    /// Total size of all entries
    total_size: usize,
}

impl Cache {
    fn put(&mut self, key: &str, entry: CachedResponse) {
        if let Some(old) = self.entries.remove(key) {
            self.total_size = self.total_size.saturating_sub(old.size);
        }
        self.total_size += entry.size;
        self.entries.insert(key.to_string(), entry);
    }

    fn match_key(&self, key: &str) -> Option<&CachedResponse> {
        self.entries.get(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// In-memory tier storage.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    caches: RwLock<BTreeMap<String, Cache>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes held by one tier, `0` if it does not exist.
    pub fn tier_size(&self, tier: &str) -> usize {
        self.caches
            .read()
            .get(tier)
            .map(|c| c.total_size)
            .unwrap_or(0)
    }
}

impl CacheStorage for MemoryCacheStorage {
    fn open(&self, tier: &str) -> Result<(), CacheError> {
        self.caches.write().entry(tier.to_string()).or_default();
        Ok(())
    }

    fn has(&self, tier: &str) -> bool {
        self.caches.read().contains_key(tier)
    }

    fn put(&self, tier: &str, key: &str, response: &Response) -> Result<(), CacheError> {
        let entry = CachedResponse::from_response(response);
        self.caches
            .write()
            .entry(tier.to_string())
            .or_default()
            .put(key, entry);
        Ok(())
    }

    fn match_in(&self, tier: &str, key: &str) -> Result<Option<Response>, CacheError> {
        Ok(self
            .caches
            .read()
            .get(tier)
            .and_then(|c| c.match_key(key))
            .map(CachedResponse::to_response))
    }

    fn delete(&self, tier: &str) -> Result<bool, CacheError> {
        Ok(self.caches.write().remove(tier).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.caches.read().keys().cloned().collect())
    }

    fn entry_count(&self, tier: &str) -> Result<usize, CacheError> {
        self.caches
            .read()
            .get(tier)
            .map(Cache::len)
            .ok_or_else(|| CacheError::TierNotFound {
                tier: tier.to_string(),
            })
    }
}
