//! Cache tier registry.
//!
//! The fixed set of named tiers the engine reads and writes. Activation
//! deletes any persisted tier whose name is not listed here.

use serde::{Deserialize, Serialize};

/// Default FallbackAssets tier name.
pub const FALLBACK_ASSETS_TIER: &str = "fallback-image";
/// Default Prefetch tier name.
pub const PREFETCH_TIER: &str = "prefetch-v1";
/// Default ApiResponses tier name.
pub const API_RESPONSES_TIER: &str = "api-responses-v1";

/// Whether `name` can name a tier: non-empty, `[A-Za-z0-9._-]` only,
/// and not `.` or `..`.
pub fn is_valid_tier_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// What a tier holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TierPurpose {
    /// One substitute resource per content category, seeded at install.
    FallbackAssets,
    /// Build-time static assets, seeded at install.
    Prefetch,
    /// Backfilled network responses (API payloads and specific images).
    ApiResponses,
}

impl TierPurpose {
    pub const ALL: [TierPurpose; 3] = [
        TierPurpose::FallbackAssets,
        TierPurpose::Prefetch,
        TierPurpose::ApiResponses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FallbackAssets => "fallback-assets",
            Self::Prefetch => "prefetch",
            Self::ApiResponses => "api-responses",
        }
    }
}

/// Configured tier names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierNames {
    pub fallback_assets: String,
    pub prefetch: String,
    pub api_responses: String,
}

impl Default for TierNames {
    fn default() -> Self {
        Self {
            fallback_assets: FALLBACK_ASSETS_TIER.to_string(),
            prefetch: PREFETCH_TIER.to_string(),
            api_responses: API_RESPONSES_TIER.to_string(),
        }
    }
}

/// A named cache namespace with one purpose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    name: String,
    purpose: TierPurpose,
}

impl Tier {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn purpose(&self) -> TierPurpose {
        self.purpose
    }
}

/// The current version's tier set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierRegistry {
    tiers: Vec<Tier>,
}

impl TierRegistry {
    pub fn new(names: &TierNames) -> Self {
        let tiers = TierPurpose::ALL
            .iter()
            .map(|&purpose| Tier {
                name: match purpose {
                    TierPurpose::FallbackAssets => names.fallback_assets.clone(),
                    TierPurpose::Prefetch => names.prefetch.clone(),
                    TierPurpose::ApiResponses => names.api_responses.clone(),
                },
                purpose,
            })
            .collect();
        Self { tiers }
    }

    /// All tiers, in `TierPurpose::ALL` order.
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Name of the tier serving `purpose`.
    pub fn name(&self, purpose: TierPurpose) -> &str {
        self.tiers
            .iter()
            .find(|t| t.purpose == purpose)
            .map(|t| t.name.as_str())
            .unwrap_or_default()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tiers.iter().map(|t| t.name.as_str())
    }

    /// Whether `name` is one of this registry's live tiers.
    pub fn contains(&self, name: &str) -> bool {
        self.tiers.iter().any(|t| t.name == name)
    }
}

impl Default for TierRegistry {
    fn default() -> Self {
        Self::new(&TierNames::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_name_charset() {
        assert!(is_valid_tier_name(PREFETCH_TIER));
        assert!(is_valid_tier_name("v1.2_cache"));
        assert!(!is_valid_tier_name(""));
        assert!(!is_valid_tier_name(".."));
        assert!(!is_valid_tier_name("a/b"));
        assert!(!is_valid_tier_name("naïve"));
    }

    #[test]
    fn default_registry_names() {
        let registry = TierRegistry::default();
        assert_eq!(registry.name(TierPurpose::FallbackAssets), "fallback-image");
        assert_eq!(registry.name(TierPurpose::Prefetch), "prefetch-v1");
        assert_eq!(registry.name(TierPurpose::ApiResponses), "api-responses-v1");
        assert_eq!(registry.tiers().len(), 3);
    }

    #[test]
    fn contains_only_declared_names() {
        let registry = TierRegistry::default();
        assert!(registry.contains("prefetch-v1"));
        assert!(!registry.contains("prefetch-v0"));
    }

    #[test]
    fn custom_names_follow_purpose() {
        let names = TierNames {
            fallback_assets: "fb".into(),
            prefetch: "pre-v2".into(),
            api_responses: "api-v2".into(),
        };
        let registry = TierRegistry::new(&names);
        let listed: Vec<&str> = registry.names().collect();
        assert_eq!(listed, vec!["fb", "pre-v2", "api-v2"]);
        assert_eq!(registry.tiers()[1].purpose(), TierPurpose::Prefetch);
    }
}
