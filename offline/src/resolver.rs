//! Fallback Resolvers
//!
//! One serving strategy per request category. Every strategy first checks
//! the Prefetch tier for an exact match; build-time assets always win.
//!
//! | Category | On miss |
//! |---|---|
//! | navigation | network; on failure the cached index markup |
//! | image | network (CORS) + backfill; on failure the exact backfilled copy, else the category fallback asset |
//! | api | network + backfill; on connectivity failure the backfilled copy |
//! | static-asset, other | network only |
//!
//! Every degradation step is logged at `warn`. The only terminal error on
//! the fallback paths is a miss on the last tier that could answer.

use crate::cache_storage::CacheStorage;
use crate::classifier::{extract_item_id, RequestCategory};
use crate::config::{EngineConfig, Endpoints};
use crate::error::WorkerError;
use crate::fetch::{
    cache_key, FetchSource, Network, Request, RequestMethod, RequestMode, Response,
    ServedResponse,
};
use crate::record_store::RecordStore;
use crate::tiers::{TierPurpose, TierRegistry};

/// Serving strategies over borrowed collaborators.
pub struct Resolvers<'a> {
    config: &'a EngineConfig,
    endpoints: &'a Endpoints,
    registry: &'a TierRegistry,
    network: &'a dyn Network,
    caches: &'a dyn CacheStorage,
    records: &'a dyn RecordStore,
}

impl<'a> Resolvers<'a> {
    pub fn new(
        config: &'a EngineConfig,
        endpoints: &'a Endpoints,
        registry: &'a TierRegistry,
        network: &'a dyn Network,
        caches: &'a dyn CacheStorage,
        records: &'a dyn RecordStore,
    ) -> Self {
        Self {
            config,
            endpoints,
            registry,
            network,
            caches,
            records,
        }
    }

    /// Produce a response for an already classified request.
    pub async fn resolve(
        &self,
        request: &Request,
        category: RequestCategory,
    ) -> Result<ServedResponse, WorkerError> {
        if let Some(hit) = self.lookup(TierPurpose::Prefetch, &request.cache_key()) {
            log::trace!("[SW Fetch] Prefetch hit for {}", request.url);
            return Ok(ServedResponse::new(hit, FetchSource::Prefetch));
        }

        match category {
            RequestCategory::Navigation => self.navigation(request).await,
            RequestCategory::Image => self.image(request).await,
            RequestCategory::Api => self.api(request).await,
            RequestCategory::StaticAsset => {
                log::warn!(
                    "[SW Fetch] Manifest asset {} missing from prefetch tier, using network",
                    request.url
                );
                self.network_only(request).await
            }
            RequestCategory::Other => self.network_only(request).await,
        }
    }

    async fn navigation(&self, request: &Request) -> Result<ServedResponse, WorkerError> {
        match self.network.fetch(request).await {
            Ok(response) if response.ok() => {
                Ok(ServedResponse::new(response, FetchSource::Network))
            }
            Ok(response) => {
                log::warn!(
                    "[SW Fetch] Navigation to {} returned {}, serving cached index",
                    request.url,
                    response.status
                );
                self.index_fallback()
            }
            Err(e) => {
                log::warn!(
                    "[SW Fetch] Navigation to {} failed ({}), serving cached index",
                    request.url,
                    e
                );
                self.index_fallback()
            }
        }
    }

    fn index_fallback(&self) -> Result<ServedResponse, WorkerError> {
        let key = cache_key(RequestMethod::Get, &self.endpoints.index);
        match self.lookup(TierPurpose::Prefetch, &key) {
            Some(index) => Ok(ServedResponse::new(index, FetchSource::IndexFallback)),
            None => {
                log::error!(
                    "[SW Fetch] Index markup {} is not cached",
                    self.endpoints.index
                );
                Err(WorkerError::NotFound {
                    what: format!("index markup {}", self.endpoints.index),
                })
            }
        }
    }

    async fn image(&self, request: &Request) -> Result<ServedResponse, WorkerError> {
        let forwarded = request.clone().with_mode(RequestMode::Cors);
        match self.network.fetch(&forwarded).await {
            Ok(response) if response.ok() => {
                self.backfill(request, &response);
                Ok(ServedResponse::new(response, FetchSource::Network))
            }
            Ok(response) => {
                log::warn!(
                    "[SW Fetch] Image {} returned {}, falling back",
                    request.url,
                    response.status
                );
                self.image_fallback(request)
            }
            Err(e) => {
                log::warn!("[SW Fetch] Image {} failed ({}), falling back", request.url, e);
                self.image_fallback(request)
            }
        }
    }

    fn image_fallback(&self, request: &Request) -> Result<ServedResponse, WorkerError> {
        if let Some(copy) = self.lookup(TierPurpose::ApiResponses, &request.cache_key()) {
            log::debug!("[SW Fetch] Serving backfilled copy of {}", request.url);
            return Ok(ServedResponse::new(copy, FetchSource::ApiCache));
        }

        let asset_url = self.fallback_asset_for(request);
        let key = cache_key(RequestMethod::Get, &asset_url);
        match self.lookup(TierPurpose::FallbackAssets, &key) {
            Some(asset) => Ok(ServedResponse::new(asset, FetchSource::FallbackAsset)),
            None => {
                log::error!(
                    "[SW Fetch] Fallback asset {} for {} is not cached",
                    asset_url,
                    request.url
                );
                Err(WorkerError::NotFound {
                    what: format!("fallback asset {}", asset_url),
                })
            }
        }
    }

    /// Category fallback asset URL for an image request.
    ///
    /// Any failure to find the item's category degrades to the generic
    /// default asset.
    fn fallback_asset_for(&self, request: &Request) -> String {
        let Some(id) = extract_item_id(&request.url) else {
            log::warn!(
                "[SW Fetch] No item id in {}, using default fallback",
                request.url
            );
            return self.endpoints.default_fallback.clone();
        };

        match self.records.get(id) {
            Ok(record) => self.config.fallback_asset_url(&record.category),
            Err(e) if e.is_not_found() => {
                log::warn!("[SW Store] No record for item {}, using default fallback", id);
                self.endpoints.default_fallback.clone()
            }
            Err(e) => {
                log::warn!(
                    "[SW Store] Record store unavailable ({}), using default fallback",
                    e
                );
                self.endpoints.default_fallback.clone()
            }
        }
    }

    async fn api(&self, request: &Request) -> Result<ServedResponse, WorkerError> {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.ok() {
                    self.backfill(request, &response);
                }
                Ok(ServedResponse::new(response, FetchSource::Network))
            }
            Err(e) => {
                log::warn!(
                    "[SW Fetch] API request {} failed ({}), reading cache",
                    request.url,
                    e
                );
                match self.lookup(TierPurpose::ApiResponses, &request.cache_key()) {
                    Some(copy) => Ok(ServedResponse::new(copy, FetchSource::ApiCache)),
                    None => {
                        log::warn!("[SW Fetch] No cached response for {}", request.url);
                        Err(WorkerError::NotFound {
                            what: format!("cached response for {}", request.url),
                        })
                    }
                }
            }
        }
    }

    async fn network_only(&self, request: &Request) -> Result<ServedResponse, WorkerError> {
        let response = self.network.fetch(request).await?;
        Ok(ServedResponse::new(response, FetchSource::Network))
    }

    /// Write `response` into the ApiResponses tier under the request's key.
    ///
    /// GET only. A failed write is logged and does not affect the caller.
    fn backfill(&self, request: &Request, response: &Response) {
        if request.method != RequestMethod::Get {
            return;
        }
        let tier = self.registry.name(TierPurpose::ApiResponses);
        match self.caches.put(tier, &request.cache_key(), response) {
            Ok(()) => log::trace!("[SW Cache] Backfilled {} into {}", request.url, tier),
            Err(e) => log::warn!("[SW Cache] Backfill of {} failed: {}", request.url, e),
        }
    }

    /// Exact lookup in one tier. A storage error counts as a miss.
    fn lookup(&self, purpose: TierPurpose, key: &str) -> Option<Response> {
        let tier = self.registry.name(purpose);
        match self.caches.match_in(tier, key) {
            Ok(hit) => hit,
            Err(e) => {
                log::warn!("[SW Cache] Read of {} from {} failed: {}", key, tier, e);
                None
            }
        }
    }
}
