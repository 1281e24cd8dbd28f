//! HTTP layer: response contract and status mapping.
//!
//! This is the ONLY place for status code handling. client/mod.rs never
//! interprets status codes.

use std::sync::Arc;

use ggm_offline::{Fetch, Request};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// How a 404 is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NotFound {
    /// 404 means "no such record": `Ok(None)`.
    Absent,
    /// 404 is a failure like any other non-2xx status.
    Error,
}

/// Transport plus base URL.
#[derive(Clone)]
pub(crate) struct HttpBackend {
    pub(crate) transport: Arc<dyn Fetch>,
    pub(crate) base_url: url::Url,
}

impl HttpBackend {
    /// Send a request and apply the response contract:
    ///
    /// - 404 → `Ok(None)` (with [`NotFound::Absent`])
    /// - other non-2xx → [`ClientError::Status`]
    /// - 2xx with an empty body → `Ok(None)`
    /// - 2xx otherwise → parsed JSON, or [`ClientError::Malformed`]
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: Request,
        not_found: NotFound,
    ) -> ClientResult<Option<T>> {
        let url = request.url.to_string();
        let response = self.transport.fetch(request).await?;
        let status = response.status.as_u16();

        match status {
            404 if not_found == NotFound::Absent => {
                debug!(url = %url, "not found, treating as absent");
                Ok(None)
            }
            200..=299 => {
                if response.body.iter().all(u8::is_ascii_whitespace) {
                    return Ok(None);
                }
                response
                    .json()
                    .map(Some)
                    .map_err(|e| ClientError::Malformed {
                        message: format!("{} from {}", e, url),
                    })
            }
            _ => Err(ClientError::Status { status, url }),
        }
    }
}
