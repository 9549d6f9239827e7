//! Engine configuration.
//!
//! Loaded from TOML or built in code. Every origin, path and tier name the
//! engine uses comes from here.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::tiers::{is_valid_tier_name, TierNames};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Origin the app is served from.
    pub serving_origin: String,
    /// Origin of the domain API.
    pub api_origin: String,
    /// Path prefix reserved for item images.
    pub images_prefix: String,
    /// Bulk domain-collection endpoint, relative to `api_origin`.
    pub items_path: String,
    /// Cached index markup, relative to `serving_origin`.
    pub index_url: String,
    /// Categories that have a fallback asset.
    pub fallback_categories: Vec<String>,
    /// Category of the generic default fallback asset.
    pub default_fallback_category: String,
    /// File extension of fallback assets.
    pub fallback_extension: String,
    /// Static-asset manifest seeded into the Prefetch tier. The index
    /// markup is always seeded, listed here or not.
    pub precache: Vec<String>,
    /// Tier names.
    pub tiers: TierNames,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            serving_origin: "https://localhost:3000".to_string(),
            api_origin: "https://localhost:3100".to_string(),
            images_prefix: "/images/".to_string(),
            items_path: "/api/items".to_string(),
            index_url: "/".to_string(),
            fallback_categories: vec!["grocery".to_string()],
            default_fallback_category: "grocery".to_string(),
            fallback_extension: "png".to_string(),
            precache: Vec::new(),
            tiers: TierNames::default(),
        }
    }
}

/// URLs derived from a validated config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Normalized serving origin (`scheme://host[:port]`).
    pub serving_origin: String,
    /// Normalized API origin.
    pub api_origin: String,
    /// Absolute index markup URL.
    pub index: String,
    /// Absolute bulk item collection URL.
    pub items: String,
    /// Absolute precache URLs, deduplicated, in manifest order.
    pub precache: Vec<String>,
    /// Absolute URL of every fallback asset.
    pub fallback_assets: Vec<String>,
    /// Absolute URL of the generic default fallback asset.
    pub default_fallback: String,
}

impl EngineConfig {
    /// Defaults with a different serving origin.
    pub fn new(serving_origin: impl Into<String>) -> Self {
        Self {
            serving_origin: serving_origin.into(),
            ..Self::default()
        }
    }

    /// Load a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a config from a TOML string. Missing keys take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Toml(e.to_string()))
    }

    /// Resolve `url` against the serving origin. Absolute URLs pass through.
    pub fn resolve_url(&self, url: &str) -> Result<String, ConfigError> {
        let base = parse_url(&self.serving_origin)?;
        base.join(url)
            .map(String::from)
            .map_err(|e| ConfigError::Url {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    /// Absolute URL of the fallback asset for `category`.
    ///
    /// The category is matched case-insensitively: `Dairy` and `dairy` map
    /// to the same `fallback-dairy` asset.
    pub fn fallback_asset_url(&self, category: &str) -> String {
        format!(
            "{}{}{}.{}",
            self.api_origin.trim_end_matches('/'),
            self.images_prefix,
            fallback_asset_name(category),
            self.fallback_extension
        )
    }

    /// Check the config and derive every absolute URL the engine needs.
    pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        let serving_origin = normalize_origin(&self.serving_origin)?;
        let api_origin = normalize_origin(&self.api_origin)?;

        if !self.images_prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "images_prefix must start with '/': {}",
                self.images_prefix
            )));
        }

        let categories: BTreeSet<String> = self
            .fallback_categories
            .iter()
            .map(|c| c.trim().to_lowercase())
            .collect();
        if categories.iter().any(|c| c.is_empty()) {
            return Err(ConfigError::Invalid("empty fallback category".into()));
        }
        let default_category = self.default_fallback_category.trim().to_lowercase();
        if !categories.contains(&default_category) {
            return Err(ConfigError::Invalid(format!(
                "default fallback category '{}' is not in fallback_categories",
                self.default_fallback_category
            )));
        }

        let names = [
            &self.tiers.fallback_assets,
            &self.tiers.prefetch,
            &self.tiers.api_responses,
        ];
        if let Some(bad) = names.iter().find(|n| !is_valid_tier_name(n)) {
            return Err(ConfigError::Invalid(format!("invalid tier name: {bad:?}")));
        }
        let distinct: BTreeSet<&String> = names.iter().copied().collect();
        if distinct.len() != names.len() {
            return Err(ConfigError::Invalid("tier names must be distinct".into()));
        }

        let items = parse_url(&self.api_origin)?
            .join(&self.items_path)
            .map(String::from)
            .map_err(|e| ConfigError::Url {
                url: self.items_path.clone(),
                reason: e.to_string(),
            })?;

        let index = self.resolve_url(&self.index_url)?;
        let mut seen = BTreeSet::new();
        let mut precache = Vec::with_capacity(self.precache.len() + 1);
        for entry in &self.precache {
            let url = self.resolve_url(entry)?;
            if seen.insert(url.clone()) {
                precache.push(url);
            }
        }
        // Offline navigation serves the index from the Prefetch tier.
        if seen.insert(index.clone()) {
            precache.push(index.clone());
        }

        Ok(Endpoints {
            serving_origin,
            api_origin,
            index,
            items,
            precache,
            fallback_assets: categories
                .iter()
                .map(|c| self.fallback_asset_url(c))
                .collect(),
            default_fallback: self.fallback_asset_url(&default_category),
        })
    }
}

/// `fallback-<category>`, lower-cased.
pub fn fallback_asset_name(category: &str) -> String {
    format!("fallback-{}", category.trim().to_lowercase())
}

/// ASCII serialization of the origin of `url`.
pub fn normalize_origin(url: &str) -> Result<String, ConfigError> {
    Ok(parse_url(url)?.origin().ascii_serialization())
}

fn parse_url(url: &str) -> Result<Url, ConfigError> {
    Url::parse(url).map_err(|e| ConfigError::Url {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_source_deployment() {
        let config = EngineConfig::default();
        let endpoints = config.endpoints().unwrap();
        assert_eq!(
            endpoints.default_fallback,
            "https://localhost:3100/images/fallback-grocery.png"
        );
        assert_eq!(endpoints.items, "https://localhost:3100/api/items");
        assert_eq!(endpoints.index, "https://localhost:3000/");
        assert_eq!(endpoints.precache, vec![endpoints.index.clone()]);
        assert_eq!(config.tiers.fallback_assets, "fallback-image");
    }

    #[test]
    fn parse_toml_with_partial_keys() {
        let toml = r#"
            serving_origin = "https://app.example.com"
            fallback_categories = ["Grocery", "Dairy"]
            precache = ["/", "/app.js", "/app.js"]

            [tiers]
            prefetch = "prefetch-v7"
        "#;
        let config = EngineConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.api_origin, "https://localhost:3100");
        assert_eq!(config.tiers.prefetch, "prefetch-v7");
        assert_eq!(config.tiers.api_responses, "api-responses-v1");

        let endpoints = config.endpoints().unwrap();
        assert_eq!(
            endpoints.precache,
            vec![
                "https://app.example.com/".to_string(),
                "https://app.example.com/app.js".to_string(),
            ]
        );
        assert!(endpoints
            .fallback_assets
            .contains(&"https://localhost:3100/images/fallback-dairy.png".to_string()));
    }

    #[test]
    fn invalid_toml_is_rejected() {
        let err = EngineConfig::from_toml_str("serving_origin = ").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn default_category_must_have_asset() {
        let config = EngineConfig {
            fallback_categories: vec!["dairy".into()],
            ..EngineConfig::default()
        };
        assert!(matches!(config.endpoints(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn duplicate_tier_names_rejected() {
        let mut config = EngineConfig::default();
        config.tiers.api_responses = config.tiers.prefetch.clone();
        assert!(matches!(config.endpoints(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn index_is_appended_to_manifest() {
        let config = EngineConfig {
            index_url: "/index.html".into(),
            precache: vec!["/app.js".into()],
            ..EngineConfig::default()
        };
        let endpoints = config.endpoints().unwrap();
        assert_eq!(
            endpoints.precache,
            vec![
                "https://localhost:3000/app.js".to_string(),
                "https://localhost:3000/index.html".to_string(),
            ]
        );
    }

    #[test]
    fn tier_names_must_be_path_safe() {
        for bad in ["", "sw/prefetch", "..", "prefetch v1", "cache\\x"] {
            let mut config = EngineConfig::default();
            config.tiers.prefetch = bad.to_string();
            assert!(
                matches!(config.endpoints(), Err(ConfigError::Invalid(_))),
                "accepted {bad:?}"
            );
        }
        let mut config = EngineConfig::default();
        config.tiers.prefetch = "prefetch_v2.1".into();
        assert!(config.endpoints().is_ok());
    }

    #[test]
    fn bad_origin_rejected() {
        let config = EngineConfig::new("not a url");
        assert!(matches!(config.endpoints(), Err(ConfigError::Url { .. })));
    }

    #[test]
    fn origins_are_normalized() {
        assert_eq!(
            normalize_origin("https://example.com:443/some/path").unwrap(),
            "https://example.com"
        );
        assert_eq!(
            normalize_origin("https://localhost:3100").unwrap(),
            "https://localhost:3100"
        );
    }

    #[test]
    fn fallback_names_are_lower_cased() {
        assert_eq!(fallback_asset_name("Produce"), "fallback-produce");
        assert_eq!(fallback_asset_name(" DAIRY "), "fallback-dairy");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline.toml");
        std::fs::write(&path, "api_origin = \"https://api.example.com\"\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.api_origin, "https://api.example.com");
    }
}
