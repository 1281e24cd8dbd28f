//! Request/response values exchanged across the interception boundary.
//!
//! Bodies are held as [`Bytes`], so cloning a response to store it in the
//! cache does not copy the payload.

use std::fmt;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{OfflineError, OfflineResult};

/// An outbound request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Build a request from a URL string.
    pub fn parse(method: Method, url: &str) -> OfflineResult<Self> {
        let url = Url::parse(url).map_err(|e| OfflineError::InvalidRequest {
            message: format!("invalid URL {}: {}", url, e),
        })?;
        Ok(Self::new(method, url))
    }

    /// Attach a JSON body and the matching content type.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> OfflineResult<Self> {
        let bytes = serde_json::to_vec(body).map_err(|e| OfflineError::InvalidRequest {
            message: format!("failed to encode JSON body: {}", e),
        })?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Normalized cache identity of this request.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.method, &self.url)
    }
}

/// A received response. Any status counts as "received"; see [`crate::Fetch`].
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// URL the response was obtained for.
    pub url: Url,
}

impl Response {
    pub fn new(status: StatusCode, url: Url, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            url,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Normalized request identity: `METHOD url`, fragment removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(method: &Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self(format!("{} {}", method.as_str(), url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
