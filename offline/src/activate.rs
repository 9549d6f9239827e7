//! Activation Sweeper
//!
//! Cuts over from the previous version's tiers to the current registry:
//! every persisted tier the registry does not name is deleted, then every
//! registry tier is opened so the live set is exactly the registry.

use crate::cache_storage::CacheStorage;
use crate::error::CacheError;
use crate::tiers::TierRegistry;

/// Outcome of an activation sweep.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivationReport {
    /// Tiers deleted by this sweep, sorted.
    pub deleted: Vec<String>,
    /// Tiers live after the sweep, sorted.
    pub live: Vec<String>,
}

/// Delete stale tiers and open the registry's tiers.
///
/// Idempotent: a second sweep with the same registry deletes nothing.
pub fn sweep(
    caches: &dyn CacheStorage,
    registry: &TierRegistry,
) -> Result<ActivationReport, CacheError> {
    let mut deleted = Vec::new();
    for name in caches.keys()? {
        if registry.contains(&name) {
            continue;
        }
        if caches.delete(&name)? {
            log::info!("[SW Activate] Deleted stale tier {}", name);
            deleted.push(name);
        }
    }

    for name in registry.names() {
        caches.open(name)?;
    }

    let live = caches.keys()?;
    log::info!(
        "[SW Activate] Live tiers: {:?} ({} deleted)",
        live,
        deleted.len()
    );
    Ok(ActivationReport { deleted, live })
}
