//! Offline Worker
//!
//! The engine's entry points. A host drives it through three calls:
//!
//! 1. [`OfflineWorker::on_install`] once per deployed version
//! 2. [`OfflineWorker::on_activate`] to cut over to this version's tiers
//! 3. [`OfflineWorker::on_request`] for every intercepted request
//!
//! Requests that arrive before activation get
//! [`FetchResult::Passthrough`]: the host handles them with its default
//! network path.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::activate::{sweep, ActivationReport};
use crate::cache_storage::{CacheStorage, MemoryCacheStorage};
use crate::classifier::{Classifier, RequestCategory};
use crate::config::{EngineConfig, Endpoints};
use crate::error::{ConfigError, WorkerError};
use crate::fetch::{FetchResult, Network, Request, Response};
use crate::install::{InstallReport, Installer};
use crate::lifecycle::{LifecycleListener, LifecycleManager, WorkerState};
use crate::record_store::{MemoryRecordStore, RecordStore};
use crate::resolver::Resolvers;
use crate::tiers::TierRegistry;

/// Offline caching engine.
pub struct OfflineWorker {
    config: EngineConfig,
    endpoints: Endpoints,
    registry: TierRegistry,
    classifier: Classifier,
    network: Arc<dyn Network>,
    caches: Arc<dyn CacheStorage>,
    records: Arc<dyn RecordStore>,
    lifecycle: Mutex<LifecycleManager>,
}

impl OfflineWorker {
    /// Build a worker from a config and its collaborators.
    pub fn new(
        config: EngineConfig,
        network: Arc<dyn Network>,
        caches: Arc<dyn CacheStorage>,
        records: Arc<dyn RecordStore>,
    ) -> Result<Self, ConfigError> {
        let endpoints = config.endpoints()?;
        let registry = TierRegistry::new(&config.tiers);
        let classifier = Classifier::new(&endpoints, config.images_prefix.clone());
        Ok(Self {
            config,
            endpoints,
            registry,
            classifier,
            network,
            caches,
            records,
            lifecycle: Mutex::new(LifecycleManager::new()),
        })
    }

    /// Worker backed by in-memory tiers and record store.
    pub fn in_memory(config: EngineConfig, network: Arc<dyn Network>) -> Result<Self, ConfigError> {
        Self::new(
            config,
            network,
            Arc::new(MemoryCacheStorage::new()),
            Arc::new(MemoryRecordStore::new()),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn registry(&self) -> &TierRegistry {
        &self.registry
    }

    pub fn caches(&self) -> &Arc<dyn CacheStorage> {
        &self.caches
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.lifecycle.lock().state()
    }

    /// Register a lifecycle listener.
    ///
    /// Listeners run while the lifecycle lock is held and must not call
    /// back into the worker.
    pub fn add_listener(&self, listener: LifecycleListener) {
        self.lifecycle.lock().add_listener(listener);
    }

    /// Classify a request without serving it.
    pub fn classify(&self, request: &Request) -> RequestCategory {
        self.classifier.classify(request)
    }

    fn transition(&self, state: WorkerState) -> Result<(), WorkerError> {
        self.lifecycle.lock().transition(state)
    }

    /// Install this version: seed every tier and the record store.
    ///
    /// Only valid in [`WorkerState::Parsed`]. On failure, or if the returned
    /// future is dropped before it completes, the worker goes back to
    /// `Parsed` so the host can retry.
    pub async fn on_install(&self) -> Result<InstallReport, WorkerError> {
        self.transition(WorkerState::Installing)?;
        let mut guard = InstallGuard {
            worker: self,
            armed: true,
        };

        let installer = Installer::new(
            &self.endpoints,
            &self.registry,
            self.network.as_ref(),
            self.caches.as_ref(),
            self.records.as_ref(),
        );
        match installer.run().await {
            Ok(report) => {
                guard.armed = false;
                drop(guard);
                self.transition(WorkerState::Installed)?;
                Ok(report)
            }
            Err(e) => {
                log::error!("[SW Install] Install failed: {}", e);
                drop(guard);
                Err(e.into())
            }
        }
    }

    /// Activate this version: delete stale tiers and start serving.
    ///
    /// Valid in [`WorkerState::Installed`]. On an already activated worker
    /// the sweep runs again and deletes nothing.
    pub fn on_activate(&self) -> Result<ActivationReport, WorkerError> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state() == WorkerState::Activated {
                drop(lifecycle);
                return Ok(sweep(self.caches.as_ref(), &self.registry)?);
            }
            lifecycle.transition(WorkerState::Activating)?;
        }

        match sweep(self.caches.as_ref(), &self.registry) {
            Ok(report) => {
                self.transition(WorkerState::Activated)?;
                Ok(report)
            }
            Err(e) => {
                log::error!("[SW Activate] Activation failed: {}", e);
                self.transition(WorkerState::Installed)?;
                Err(e.into())
            }
        }
    }

    /// Intercept one request.
    pub async fn on_request(&self, request: &Request) -> Result<FetchResult, WorkerError> {
        let state = self.state();
        if !state.is_serving() {
            log::trace!("[SW Fetch] Passthrough for {} (worker {})", request.url, state);
            return Ok(FetchResult::Passthrough);
        }

        let category = self.classifier.classify(request);
        log::debug!(
            "[SW Fetch] {} {} -> {}",
            request.method.as_str(),
            request.url,
            category
        );

        let resolvers = Resolvers::new(
            &self.config,
            &self.endpoints,
            &self.registry,
            self.network.as_ref(),
            self.caches.as_ref(),
            self.records.as_ref(),
        );
        let served = resolvers.resolve(request, category).await?;
        Ok(FetchResult::Response(served))
    }

    /// Intercept one request and always produce a response.
    ///
    /// Passthrough requests go straight to the network; errors are
    /// rendered with [`WorkerError::to_response`].
    pub async fn respond(&self, request: &Request) -> Response {
        match self.on_request(request).await {
            Ok(FetchResult::Response(served)) => served.response,
            Ok(FetchResult::Passthrough) => match self.network.fetch(request).await {
                Ok(response) => response,
                Err(e) => WorkerError::from(e).to_response(&request.url),
            },
            Err(e) => e.to_response(&request.url),
        }
    }

    /// Tear the worker down. It stops serving for good.
    pub fn retire(&self) -> Result<(), WorkerError> {
        self.transition(WorkerState::Redundant)
    }
}

/// Puts an unfinished install back to `Parsed` when dropped.
struct InstallGuard<'a> {
    worker: &'a OfflineWorker,
    armed: bool,
}

impl Drop for InstallGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.worker.transition(WorkerState::Parsed) {
            log::warn!("[SW Install] Could not reset after failed install: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures::executor::block_on;

    use crate::error::NetworkError;
    use crate::fetch::FetchSource;
    use crate::lifecycle::LifecycleEvent;

    /// Answers every URL with `200 <url>`.
    struct EchoNetwork;

    #[async_trait]
    impl Network for EchoNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
            let body = if request.url.ends_with("/api/items") {
                r#"[{"id": 1, "category": "grocery"}]"#.to_string()
            } else {
                request.url.clone()
            };
            Ok(Response::new(200).with_url(request.url.clone()).with_body(body))
        }
    }

    struct DownNetwork;

    #[async_trait]
    impl Network for DownNetwork {
        async fn fetch(&self, _: &Request) -> Result<Response, NetworkError> {
            Err(NetworkError::Connectivity("offline".into()))
        }
    }

    fn worker(network: Arc<dyn Network>) -> OfflineWorker {
        OfflineWorker::in_memory(EngineConfig::default(), network).unwrap()
    }

    #[test]
    fn full_lifecycle() {
        let worker = worker(Arc::new(EchoNetwork));
        assert_eq!(worker.state(), WorkerState::Parsed);

        let report = block_on(worker.on_install()).unwrap();
        assert_eq!(report.fallback_assets, 1);
        assert_eq!(report.records, 1);
        assert_eq!(worker.state(), WorkerState::Installed);

        worker.on_activate().unwrap();
        assert_eq!(worker.state(), WorkerState::Activated);

        let result = block_on(worker.on_request(&Request::navigate("https://localhost:3000/")))
            .unwrap();
        match result {
            FetchResult::Response(served) => assert_eq!(served.source, FetchSource::Network),
            FetchResult::Passthrough => panic!("activated worker passed through"),
        }
    }

    #[test]
    fn requests_before_activation_pass_through() {
        let worker = worker(Arc::new(EchoNetwork));
        let request = Request::navigate("https://localhost:3000/");
        assert_eq!(
            block_on(worker.on_request(&request)).unwrap(),
            FetchResult::Passthrough
        );
        block_on(worker.on_install()).unwrap();
        assert_eq!(
            block_on(worker.on_request(&request)).unwrap(),
            FetchResult::Passthrough
        );
    }

    #[test]
    fn failed_install_resets_to_parsed() {
        let worker = worker(Arc::new(DownNetwork));
        let err = block_on(worker.on_install()).unwrap_err();
        assert!(matches!(err, WorkerError::Install(_)));
        assert_eq!(worker.state(), WorkerState::Parsed);
    }

    #[test]
    fn activate_before_install_is_rejected() {
        let worker = worker(Arc::new(EchoNetwork));
        assert!(matches!(
            worker.on_activate(),
            Err(WorkerError::InvalidStateTransition {
                from: WorkerState::Parsed,
                to: WorkerState::Activating,
            })
        ));
    }

    #[test]
    fn second_activation_is_a_no_op() {
        let worker = worker(Arc::new(EchoNetwork));
        block_on(worker.on_install()).unwrap();
        worker.on_activate().unwrap();
        let again = worker.on_activate().unwrap();
        assert!(again.deleted.is_empty());
        assert_eq!(worker.state(), WorkerState::Activated);
    }

    #[test]
    fn listeners_observe_transitions() {
        let worker = worker(Arc::new(EchoNetwork));
        let changes = Arc::new(AtomicUsize::new(0));
        let counter = changes.clone();
        worker.add_listener(Box::new(move |event| {
            if matches!(event, LifecycleEvent::StateChange(_)) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        block_on(worker.on_install()).unwrap();
        worker.on_activate().unwrap();
        assert_eq!(changes.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn respond_renders_errors() {
        let worker = worker(Arc::new(EchoNetwork));
        block_on(worker.on_install()).unwrap();
        worker.on_activate().unwrap();

        let offline = OfflineWorker::new(
            EngineConfig::default(),
            Arc::new(DownNetwork),
            worker.caches().clone(),
            worker.records().clone(),
        )
        .unwrap();
        // Fresh worker over the same stores: not serving yet.
        let response = block_on(offline.respond(&Request::new("https://cdn.example.com/x.js")));
        assert_eq!(response.status, 504);
    }

    #[test]
    fn state_is_readable_across_threads() {
        let worker = Arc::new(worker(Arc::new(EchoNetwork)));
        block_on(worker.on_install()).unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let worker = worker.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let state = worker.state();
                        assert!(matches!(
                            state,
                            WorkerState::Installed | WorkerState::Activating | WorkerState::Activated
                        ));
                    }
                })
            })
            .collect();
        worker.on_activate().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(worker.state(), WorkerState::Activated);
    }

    #[test]
    fn retired_worker_stops_serving() {
        let worker = worker(Arc::new(EchoNetwork));
        block_on(worker.on_install()).unwrap();
        worker.on_activate().unwrap();
        worker.retire().unwrap();
        assert_eq!(worker.state(), WorkerState::Redundant);
        assert_eq!(
            block_on(worker.on_request(&Request::navigate("https://localhost:3000/"))).unwrap(),
            FetchResult::Passthrough
        );
    }
}
