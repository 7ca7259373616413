//! Request/response value types seen by the cache agent.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::error::TrackerError;

/// Body of the response returned when every fallback is exhausted
pub const OFFLINE_FALLBACK_BODY: &str = "Network error or resource not found in cache.";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        };
        f.write_str(name)
    }
}

/// How the page issued the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level page load
    Navigate,
    #[default]
    SameOrigin,
    Cors,
    NoCors,
}

/// An outgoing request intercepted by the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            mode: RequestMode::default(),
        }
    }

    /// Parse `url` into a GET request.
    pub fn get(url: &str) -> Result<Self, TrackerError> {
        Ok(Self::new(Method::Get, Url::parse(url)?))
    }

    /// Parse `url` into a navigation (page load) request.
    pub fn navigate(url: &str) -> Result<Self, TrackerError> {
        Ok(Self::get(url)?.with_mode(RequestMode::Navigate))
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Whether the URL uses a scheme the agent may cache.
    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }
}

/// Where a response came from, as far as caching is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    /// Same-origin network response
    Basic,
    /// Cross-origin response with CORS
    Cors,
    /// Cross-origin response without CORS; contents unreadable
    Opaque,
    /// Built locally by the agent
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub response_type: ResponseType,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    /// Same-origin response with the given status and body.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            response_type: ResponseType::Basic,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200, body)
    }

    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Only complete same-origin responses are worth keeping.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.response_type == ResponseType::Basic
    }

    /// Plain-text 404 used when neither network nor cache can answer.
    pub fn offline_fallback() -> Self {
        Self::new(404, OFFLINE_FALLBACK_BODY)
            .with_type(ResponseType::Synthetic)
            .with_header("Content-Type", "text/plain")
    }
}

/// The network beneath the agent.
///
/// An `Err` means the fetch itself was rejected (offline, DNS, reset); an
/// HTTP error status is still an `Ok` response.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, TrackerError>;
}
