//! API client for the vote/subscription service.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs.
//!
//! The client sends every request through an `Arc<dyn Fetch>`, which is either
//! the plain network fetcher or a [`ggm_offline::CacheRouter`] wrapping it.

use std::sync::Arc;

use ggm_offline::{Fetch, HttpFetcher, Method, Request};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::types::{
    GrantId, RequestOutcome, ResearcherRequest, ResearcherRequestResponse, SubscribeRequest,
    SubscriptionStatus, VoteAction, VoteRecord, VoteRequest,
};

mod helpers;
mod http;

pub use helpers::ApiPath;
use helpers::parse_base_url;
use http::{HttpBackend, NotFound};

/// Uniform transport contract over the remote service.
#[derive(Clone)]
pub struct ApiClient {
    http: HttpBackend,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.http.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Client talking straight to the network.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let fetcher = HttpFetcher::new(config.timeout())?;
        Self::with_transport(config, Arc::new(fetcher))
    }

    /// Client over an explicit transport (e.g. a cache router).
    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn Fetch>) -> ClientResult<Self> {
        let base_url = parse_base_url(&config.api_url)?;
        Ok(Self {
            http: HttpBackend {
                transport,
                base_url,
            },
        })
    }

    pub fn from_env() -> ClientResult<Self> {
        Self::new(&ClientConfig::from_env())
    }

    pub fn base_url(&self) -> &Url {
        &self.http.base_url
    }

    pub fn transport(&self) -> Arc<dyn Fetch> {
        self.http.transport.clone()
    }

    fn request(&self, method: Method, path: &ApiPath) -> ClientResult<Request> {
        let url = path.resolve(&self.http.base_url)?;
        Ok(Request::new(method, url))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &ApiPath) -> ClientResult<Option<T>> {
        let request = self.request(Method::GET, path)?;
        debug!(url = %request.url, "GET");
        self.http.send_json(request, NotFound::Absent).await
    }

    pub async fn post<B, T>(&self, path: &ApiPath, body: &B) -> ClientResult<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, path)?.with_json(body)?;
        debug!(url = %request.url, "POST");
        self.http.send_json(request, NotFound::Absent).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &ApiPath) -> ClientResult<Option<T>> {
        let request = self.request(Method::DELETE, path)?;
        debug!(url = %request.url, "DELETE");
        self.http.send_json(request, NotFound::Absent).await
    }

    fn vote_path(grant_id: &GrantId, researcher: &str) -> ApiPath {
        ApiPath::parse("/vote").segment(grant_id).segment(researcher)
    }

    /// Current vote of `researcher` on a grant; `None` if they have not voted.
    pub async fn get_vote(
        &self,
        grant_id: &GrantId,
        researcher: &str,
    ) -> ClientResult<Option<VoteAction>> {
        let record: Option<VoteRecord> = self.get(&Self::vote_path(grant_id, researcher)).await?;
        Ok(record.map(|r| r.action))
    }

    pub async fn set_vote(
        &self,
        grant_id: &GrantId,
        researcher: &str,
        action: VoteAction,
    ) -> ClientResult<Option<serde_json::Value>> {
        let body = VoteRequest {
            grant_id,
            researcher_id: researcher,
            action,
        };
        self.post(&ApiPath::parse("/vote"), &body).await
    }

    pub async fn remove_vote(&self, grant_id: &GrantId, researcher: &str) -> ClientResult<()> {
        let _: Option<serde_json::Value> =
            self.delete(&Self::vote_path(grant_id, researcher)).await?;
        Ok(())
    }

    pub async fn subscription_status(&self, researcher: &str) -> ClientResult<SubscriptionStatus> {
        let path = ApiPath::parse("/subscriptions").segment(researcher);
        Ok(self.get(&path).await?.unwrap_or_default())
    }

    pub async fn subscribe(
        &self,
        researcher: &str,
        email: &str,
    ) -> ClientResult<Option<serde_json::Value>> {
        let body = SubscribeRequest {
            researcher_name: researcher,
            email,
        };
        self.post(&ApiPath::parse("/subscriptions"), &body).await
    }

    /// Unsubscribe. A 404 means the address is not subscribed and is an error.
    pub async fn unsubscribe(&self, researcher: &str, email: &str) -> ClientResult<()> {
        let path = ApiPath::parse("/unsubscribe")
            .query("email", email)
            .query("researcher", researcher);
        let request = self.request(Method::GET, &path)?;
        debug!(url = %request.url, "GET");
        let _: Option<serde_json::Value> = self.http.send_json(request, NotFound::Error).await?;
        Ok(())
    }

    /// Ask for a researcher to be added to the catalog.
    pub async fn request_researcher(
        &self,
        request: &ResearcherRequest,
    ) -> ClientResult<RequestOutcome> {
        let response: Option<ResearcherRequestResponse> = self
            .post(&ApiPath::parse("/researcher-requests"), request)
            .await?;

        match response {
            Some(r) if r.status == "success" => Ok(RequestOutcome::Submitted),
            Some(r) if r.status == "existing" => Ok(RequestOutcome::Existing(r.message)),
            Some(r) => Err(ClientError::Malformed {
                message: format!("unexpected request status: {}", r.status),
            }),
            None => Err(ClientError::Malformed {
                message: "empty researcher request response".to_string(),
            }),
        }
    }
}
