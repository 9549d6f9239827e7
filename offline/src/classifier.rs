//! Request Classifier
//!
//! Assigns every intercepted request to one handling category. Pure: the
//! same request always classifies the same way.
//!
//! Decision order, first match wins:
//! 1. HTML accept from a serving-origin client → [`RequestCategory::Navigation`]
//! 2. image accept under the images prefix → [`RequestCategory::Image`]
//! 3. target on the API origin → [`RequestCategory::Api`]
//! 4. same-origin manifest asset → [`RequestCategory::StaticAsset`]
//! 5. anything else → [`RequestCategory::Other`]
//!
//! A request without an accept header, or with a URL that does not parse,
//! is [`RequestCategory::Other`].

use std::collections::BTreeSet;
use std::fmt;

use url::Url;

use crate::config::Endpoints;
use crate::fetch::Request;

/// Handling category of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestCategory {
    Navigation,
    StaticAsset,
    Image,
    Api,
    Other,
}

impl RequestCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::StaticAsset => "static-asset",
            Self::Image => "image",
            Self::Api => "api",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request classifier bound to one deployment's origins.
#[derive(Debug, Clone)]
pub struct Classifier {
    serving_origin: String,
    api_origin: String,
    images_prefix: String,
    precache: BTreeSet<String>,
}

impl Classifier {
    pub fn new(endpoints: &Endpoints, images_prefix: impl Into<String>) -> Self {
        Self {
            serving_origin: endpoints.serving_origin.clone(),
            api_origin: endpoints.api_origin.clone(),
            images_prefix: images_prefix.into(),
            precache: endpoints.precache.iter().cloned().collect(),
        }
    }

    /// Classify a request.
    pub fn classify(&self, request: &Request) -> RequestCategory {
        let Some(accept) = request.accept() else {
            log::debug!("[SW Fetch] No accept header on {}, treating as other", request.url);
            return RequestCategory::Other;
        };
        let url = match Url::parse(&request.url) {
            Ok(url) => url,
            Err(e) => {
                log::debug!("[SW Fetch] Unparsable URL {:?} ({}), treating as other", request.url, e);
                return RequestCategory::Other;
            }
        };
        let target_origin = url.origin().ascii_serialization();
        let accept = accept.to_ascii_lowercase();

        let initiator = match &request.origin {
            Some(origin) => Url::parse(origin)
                .map(|u| u.origin().ascii_serialization())
                .unwrap_or_else(|_| origin.clone()),
            None => target_origin.clone(),
        };

        if accepts_html(&accept) && initiator == self.serving_origin {
            return RequestCategory::Navigation;
        }
        if accept.contains("image/") && url.path().starts_with(&self.images_prefix) {
            return RequestCategory::Image;
        }
        if target_origin == self.api_origin {
            return RequestCategory::Api;
        }
        if target_origin == self.serving_origin && self.precache.contains(url.as_str()) {
            return RequestCategory::StaticAsset;
        }
        RequestCategory::Other
    }
}

fn accepts_html(accept: &str) -> bool {
    accept.contains("text/html") || accept.contains("application/xhtml+xml")
}

/// Numeric filename stem of the last path segment.
///
/// `/images/42.png` → `42`. The stem is everything before the last `.`
/// (the whole segment when there is none). Query strings and fragments are
/// ignored. Returns `None` when the stem is not an integer.
pub fn extract_item_id(url: &str) -> Option<i64> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let segment = path.rsplit('/').next()?;
    let stem = match segment.rfind('.') {
        Some(dot) => &segment[..dot],
        None => segment,
    };
    stem.parse().ok()
}
