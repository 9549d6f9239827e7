//! KPIO Offline Caching Engine
//!
//! The request-interception core of an offline-capable service worker.
//! Every intercepted request is classified, then served from a persisted
//! cache tier, from the network with a backfill, or from a category
//! substitute resolved through a small local record store.
//!
//! # Architecture
//!
//! - [`tiers`]: the fixed set of named cache tiers
//! - [`cache_storage`]: persisted tier storage (memory or directory)
//! - [`record_store`]: the local record table (memory or JSON file)
//! - [`classifier`]: request → category
//! - [`install`]: seeds the tiers and the record store
//! - [`activate`]: deletes stale tiers on cutover
//! - [`resolver`]: one serving strategy per category
//! - [`lifecycle`]: worker state machine and event listeners
//! - [`worker`]: [`OfflineWorker`], the host-facing entry points
//!
//! The engine logs through the `log` facade and never installs a logger.

pub mod activate;
pub mod cache_storage;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fetch;
pub mod install;
pub mod lifecycle;
mod persist;
pub mod record_store;
pub mod resolver;
pub mod tiers;
pub mod worker;

pub use activate::ActivationReport;
pub use cache_storage::{CacheStorage, DirCacheStorage, MemoryCacheStorage};
pub use classifier::{Classifier, RequestCategory};
pub use config::{EngineConfig, Endpoints};
pub use error::{CacheError, ConfigError, InstallError, NetworkError, StoreError, WorkerError};
pub use fetch::{
    FetchResult, FetchSource, Network, Request, RequestMethod, RequestMode, Response,
    ServedResponse,
};
pub use install::InstallReport;
pub use lifecycle::{LifecycleEvent, WorkerState};
pub use record_store::{DomainRecord, FileRecordStore, MemoryRecordStore, RecordStore};
pub use tiers::{TierPurpose, TierRegistry};
pub use worker::OfflineWorker;
