//! The network boundary.
//!
//! [`Fetch`] is the single seam every outbound request passes through. The
//! reqwest-backed [`HttpFetcher`] talks to the network; the
//! [`CacheRouter`](crate::CacheRouter) wraps another `Fetch` and is itself one,
//! so callers cannot tell whether a cache sits underneath them.
//!
//! A response with any status is a successful fetch. Only a failure to obtain
//! a response at all is an error ([`OfflineError::Network`]).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::error::{OfflineError, OfflineResult};
use crate::request::{Request, Response};

const USER_AGENT_VALUE: &str = concat!("ggm-offline/", env!("CARGO_PKG_VERSION"));

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: Request) -> OfflineResult<Response>;
}

/// Network fetcher backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> OfflineResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| OfflineError::Network {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, request: Request) -> OfflineResult<Response> {
        debug!(method = %request.method, url = %request.url, "network fetch");

        let mut builder = self
            .client
            .request(request.method, request.url.clone())
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await.map_err(|e| OfflineError::Network {
            message: format!("failed to read response body: {}", e),
        })?;

        Ok(Response {
            status,
            headers,
            body,
            url,
        })
    }
}
