//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use kpio_offline::{
    DomainRecord, EngineConfig, MemoryRecordStore, Network, NetworkError, OfflineWorker,
    RecordStore, Request, Response, StoreError,
};

pub const APP: &str = "https://localhost:3000";
pub const API: &str = "https://localhost:3100";
pub const ITEMS_URL: &str = "https://localhost:3100/api/items";
pub const GROCERY_ASSET: &str = "https://localhost:3100/images/fallback-grocery.png";
pub const DAIRY_ASSET: &str = "https://localhost:3100/images/fallback-dairy.png";
pub const INDEX_HTML: &str = "<!doctype html><title>Grocery</title>";

/// Scripted network: fixed responses per URL, a kill switch, a call log.
#[derive(Default)]
pub struct MockNetwork {
    routes: Mutex<BTreeMap<String, Response>>,
    offline: AtomicBool,
    calls: Mutex<Vec<Request>>,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, url: &str, response: Response) {
        self.routes
            .lock()
            .insert(url.to_string(), response.with_url(url));
    }

    pub fn route_text(&self, url: &str, body: &str) {
        self.route(url, Response::new(200).with_body(body.to_string()));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        self.calls.lock().push(request.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Connectivity("network is offline".into()));
        }
        Ok(self
            .routes
            .lock()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Response::new(404).with_url(request.url.clone())))
    }
}

/// Record store whose every operation fails as if the disk were gone.
pub struct FailingRecordStore;

impl RecordStore for FailingRecordStore {
    fn replace_all(&self, _: Vec<DomainRecord>) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("disk detached".into()))
    }

    fn get(&self, _: i64) -> Result<DomainRecord, StoreError> {
        Err(StoreError::Unavailable("disk detached".into()))
    }

    fn count(&self) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("disk detached".into()))
    }
}

/// In-memory record store that can be made to fail after install.
#[derive(Default)]
pub struct BreakableRecordStore {
    inner: MemoryRecordStore,
    broken: AtomicBool,
}

impl BreakableRecordStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk detached".into()));
        }
        Ok(())
    }
}

impl RecordStore for BreakableRecordStore {
    fn replace_all(&self, records: Vec<DomainRecord>) -> Result<usize, StoreError> {
        self.check()?;
        self.inner.replace_all(records)
    }

    fn get(&self, id: i64) -> Result<DomainRecord, StoreError> {
        self.check()?;
        self.inner.get(id)
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.check()?;
        self.inner.count()
    }
}

/// Config with two fallback categories and a small manifest.
pub fn config() -> EngineConfig {
    EngineConfig {
        fallback_categories: vec!["grocery".into(), "dairy".into()],
        precache: vec!["/".into(), "/app.js".into()],
        ..EngineConfig::default()
    }
}

/// A network that can satisfy a full install of [`config`].
pub fn seeded_network() -> Arc<MockNetwork> {
    let network = MockNetwork::new();
    network.route_text(&format!("{APP}/"), INDEX_HTML);
    network.route_text(&format!("{APP}/app.js"), "console.log('app')");
    network.route_text(GROCERY_ASSET, "grocery-png");
    network.route_text(DAIRY_ASSET, "dairy-png");
    network.route_text(
        ITEMS_URL,
        r#"{"data": [
            {"id": 42, "category": "Dairy", "name": "Milk"},
            {"id": 7, "category": "grocery", "name": "Bread"}
        ]}"#,
    );
    network
}

/// Installed and activated in-memory worker over `network`.
pub fn serving_worker(network: Arc<MockNetwork>) -> OfflineWorker {
    let worker = OfflineWorker::in_memory(config(), network).unwrap();
    futures::executor::block_on(worker.on_install()).unwrap();
    worker.on_activate().unwrap();
    worker
}
