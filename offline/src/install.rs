//! Install Orchestrator
//!
//! Brings a fresh worker to "ready to serve offline". Three sub-tasks run
//! concurrently and the install completes only when all three succeed:
//!
//! - seed the FallbackAssets tier with every fallback asset
//! - seed the Prefetch tier with the static-asset manifest
//! - fetch the domain collection and replace the record store with it
//!
//! The first failure fails the install. Writes already made by other
//! sub-tasks stay; the next install attempt overwrites them.

use futures_util::future::{try_join3, try_join_all};
use serde::Deserialize;

use crate::cache_storage::CacheStorage;
use crate::config::Endpoints;
use crate::error::InstallError;
use crate::fetch::{cache_key, Network, Request, RequestMethod, RequestMode, Response};
use crate::record_store::{DomainRecord, RecordStore};
use crate::tiers::{TierPurpose, TierRegistry};

/// Counts of what an install wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstallReport {
    /// Entries seeded into the FallbackAssets tier.
    pub fallback_assets: usize,
    /// Entries seeded into the Prefetch tier.
    pub precached: usize,
    /// Records now in the record store.
    pub records: usize,
}

/// Body of the bulk domain-collection endpoint.
#[derive(Deserialize)]
#[serde(untagged)]
enum ItemCollection {
    Bare(Vec<DomainRecord>),
    Wrapped { data: Vec<DomainRecord> },
}

impl ItemCollection {
    fn into_records(self) -> Vec<DomainRecord> {
        match self {
            Self::Bare(records) | Self::Wrapped { data: records } => records,
        }
    }
}

/// Parse a domain collection body: a bare array or `{"data": [...]}`.
pub fn parse_collection(body: &[u8]) -> Result<Vec<DomainRecord>, InstallError> {
    serde_json::from_slice::<ItemCollection>(body)
        .map(ItemCollection::into_records)
        .map_err(|e| InstallError::InvalidCollection(e.to_string()))
}

/// One install run over borrowed collaborators.
pub struct Installer<'a> {
    endpoints: &'a Endpoints,
    registry: &'a TierRegistry,
    network: &'a dyn Network,
    caches: &'a dyn CacheStorage,
    records: &'a dyn RecordStore,
}

impl<'a> Installer<'a> {
    pub fn new(
        endpoints: &'a Endpoints,
        registry: &'a TierRegistry,
        network: &'a dyn Network,
        caches: &'a dyn CacheStorage,
        records: &'a dyn RecordStore,
    ) -> Self {
        Self {
            endpoints,
            registry,
            network,
            caches,
            records,
        }
    }

    /// Run all three sub-tasks; completes when every one has succeeded.
    pub async fn run(&self) -> Result<InstallReport, InstallError> {
        let fallback_tier = self.registry.name(TierPurpose::FallbackAssets);
        let prefetch_tier = self.registry.name(TierPurpose::Prefetch);

        let (fallback_assets, precached, records) = try_join3(
            self.add_all(fallback_tier, &self.endpoints.fallback_assets, RequestMode::Cors),
            self.add_all(prefetch_tier, &self.endpoints.precache, RequestMode::SameOrigin),
            self.populate_records(),
        )
        .await?;

        let report = InstallReport {
            fallback_assets,
            precached,
            records,
        };
        log::info!(
            "[SW Install] Seeded {} fallback assets, {} prefetch entries, {} records",
            report.fallback_assets,
            report.precached,
            report.records
        );
        Ok(report)
    }

    /// Fetch every URL and store the responses in `tier`.
    ///
    /// Nothing is written unless every fetch returned an OK response.
    async fn add_all(
        &self,
        tier: &str,
        urls: &[String],
        mode: RequestMode,
    ) -> Result<usize, InstallError> {
        self.caches.open(tier)?;

        let fetches = urls.iter().map(|url| self.fetch_ok(url, mode));
        let responses = try_join_all(fetches).await?;

        for (url, response) in urls.iter().zip(&responses) {
            self.caches
                .put(tier, &cache_key(RequestMethod::Get, url), response)?;
        }
        log::debug!("[SW Install] Stored {} entries in {}", responses.len(), tier);
        Ok(responses.len())
    }

    async fn fetch_ok(&self, url: &str, mode: RequestMode) -> Result<Response, InstallError> {
        let request = Request::new(url).with_mode(mode);
        let response = self.network.fetch(&request).await?;
        if !response.ok() {
            log::error!("[SW Install] {} returned {}", url, response.status);
            return Err(InstallError::SeedFailed {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response)
    }

    /// Fetch the domain collection and replace the record table with it.
    async fn populate_records(&self) -> Result<usize, InstallError> {
        let request = Request::new(&self.endpoints.items)
            .with_mode(RequestMode::Cors)
            .with_header("accept", "application/json");
        let response = self.network.fetch(&request).await?;
        if !response.ok() {
            log::error!(
                "[SW Install] Item collection {} returned {}",
                self.endpoints.items,
                response.status
            );
            return Err(InstallError::SeedFailed {
                url: self.endpoints.items.clone(),
                status: response.status,
            });
        }

        let records = parse_collection(&response.body)?;
        Ok(self.records.replace_all(records)?)
    }
}
