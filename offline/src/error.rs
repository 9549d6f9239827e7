//! Error types for the offline caching engine.
//!
//! One enum per seam. Lower layers convert upward with `#[from]`; the
//! engine-level [`WorkerError`] is what `on_install`, `on_activate` and
//! `on_request` return.

use std::io;

use crate::fetch::Response;
use crate::lifecycle::WorkerState;

/// Failure reported by the network collaborator.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("connectivity failure: {0}")]
    Connectivity(String),

    #[error("request aborted")]
    Aborted,
}

/// Local structured store errors.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("record not found: {id}")]
    NotFound { id: i64 },

    #[error("duplicate record id in batch: {id}")]
    DuplicateId { id: i64 },

    #[error("invalid record {id}: {reason}")]
    InvalidRecord { id: i64, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// `true` for a plain lookup miss, `false` when the store itself failed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Cache tier storage errors.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("cache tier not found: {tier}")]
    TierNotFound { tier: String },

    #[error("invalid cache data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration loading and validation errors.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid TOML: {0}")]
    Toml(String),

    #[error("invalid URL '{url}': {reason}")]
    Url { url: String, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Install step failures. Any of these fails the whole install.
#[derive(thiserror::Error, Debug)]
pub enum InstallError {
    #[error("seeding {url} failed with status {status}")]
    SeedFailed { url: String, status: u16 },

    #[error("invalid item collection: {0}")]
    InvalidCollection(String),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Engine-level errors surfaced to the host.
#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    #[error("network failure: {0}")]
    NetworkFailure(#[from] NetworkError),

    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: WorkerState, to: WorkerState },

    #[error("install failed: {0}")]
    Install(#[from] InstallError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl WorkerError {
    /// HTTP status used when this error is rendered as a response.
    ///
    /// - `504`: the network was the only path and it failed
    /// - `404`: every fallback tier missed
    /// - `500`: everything else
    pub fn status(&self) -> u16 {
        match self {
            Self::NetworkFailure(_) => 504,
            Self::NotFound { .. } => 404,
            _ => 500,
        }
    }

    /// Render the visible error response for `url`.
    pub fn to_response(&self, url: &str) -> Response {
        Response::new(self.status())
            .with_url(url)
            .with_header("content-type", "text/plain; charset=utf-8")
            .with_body(self.to_string())
    }
}
