//! Fetch Model
//!
//! Request/response types seen by the engine and the network collaborator
//! it forwards to.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::error::NetworkError;

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Default for RequestMethod {
    fn default() -> Self {
        Self::Get
    }
}

impl RequestMethod {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

/// Request mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Same-origin only
    SameOrigin,
    /// No CORS
    NoCors,
    /// CORS
    Cors,
    /// Navigate
    Navigate,
}

impl Default for RequestMode {
    fn default() -> Self {
        Self::NoCors
    }
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Absolute target URL
    pub url: String,
    /// HTTP method
    pub method: RequestMethod,
    /// Headers, names stored lower-cased
    pub headers: BTreeMap<String, String>,
    /// Request mode
    pub mode: RequestMode,
    /// Origin of the client that issued the request, if known.
    /// `None` means the target URL's own origin.
    pub origin: Option<String>,
}

impl Request {
    /// Create a GET request
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: RequestMethod::Get,
            headers: BTreeMap::new(),
            mode: RequestMode::default(),
            origin: None,
        }
    }

    /// Page navigation: HTML accept header, navigate mode.
    pub fn navigate(url: impl Into<String>) -> Self {
        Self::new(url)
            .with_header("accept", "text/html,application/xhtml+xml")
            .with_mode(RequestMode::Navigate)
    }

    /// Image load as issued by an `<img>` element.
    pub fn image(url: impl Into<String>) -> Self {
        Self::new(url).with_header("accept", "image/webp,image/*,*/*;q=0.8")
    }

    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Set a header. Names are case-insensitive.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The accept header, if the request carried one.
    pub fn accept(&self) -> Option<&str> {
        self.header("accept")
    }

    /// Key under which this request's response is cached.
    pub fn cache_key(&self) -> String {
        cache_key(self.method, &self.url)
    }
}

/// Build a cache key from a method and an absolute URL.
///
/// The URL is normalized first, so `https://HOST:443/a` and `https://host/a`
/// share a key. A URL that does not parse is used as given.
pub fn cache_key(method: RequestMethod, url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => format!("{}:{}", method.as_str(), parsed),
        Err(_) => format!("{}:{}", method.as_str(), url),
    }
}

/// A response from the network or from a cache tier.
///
/// The body is an immutable shared buffer: handing it to the caller and
/// writing it into a tier share the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Final URL
    pub url: String,
    /// Status code
    pub status: u16,
    /// Status text
    pub status_text: String,
    /// Headers, names stored lower-cased
    pub headers: BTreeMap<String, String>,
    /// Body
    pub body: Bytes,
}

impl Response {
    /// Create an empty response with the given status
    pub fn new(status: u16) -> Self {
        Self {
            url: String::new(),
            status,
            status_text: status_text_for(status).to_string(),
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Check if response is OK
    pub fn ok(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Body as UTF-8, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Get status text for status code
pub(crate) fn status_text_for(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// Fresh from the network.
    Network,
    /// Build-time asset from the Prefetch tier.
    Prefetch,
    /// Backfilled copy from the ApiResponses tier.
    ApiCache,
    /// Category substitute from the FallbackAssets tier.
    FallbackAsset,
    /// Cached index markup served for a failed navigation.
    IndexFallback,
}

/// A response together with the path that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedResponse {
    pub response: Response,
    pub source: FetchSource,
}

impl ServedResponse {
    pub fn new(response: Response, source: FetchSource) -> Self {
        Self { response, source }
    }
}

/// Result of intercepting a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// The engine produced a response.
    Response(ServedResponse),
    /// The worker is not serving yet; the host should use its default
    /// network handling.
    Passthrough,
}

/// Network collaborator.
///
/// One attempt per call; no retries. Non-OK statuses are returned as
/// responses, only connectivity failures are errors.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}
