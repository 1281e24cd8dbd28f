//! Application context.
//!
//! Owns the collaborators that would otherwise be process-wide singletons, so
//! several independent instances can coexist (one per test, for example).

use std::sync::Arc;

use ggm_offline::{Fetch, HttpFetcher};
use tracing::info;

use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::identity::IdentityResolver;
use crate::storage::{FileStore, KeyValueStore};
use crate::subscription::SubscriptionManager;
use crate::vote::VoteStore;

#[derive(Debug, Clone)]
pub struct AppContext {
    config: ClientConfig,
    api: ApiClient,
    identity: IdentityResolver,
    votes: VoteStore,
    subscriptions: SubscriptionManager,
}

impl AppContext {
    /// Build from an explicit transport and state store.
    pub async fn new(
        config: ClientConfig,
        transport: Arc<dyn Fetch>,
        store: Arc<dyn KeyValueStore>,
    ) -> ClientResult<Self> {
        let api = ApiClient::with_transport(&config, transport)?;
        let identity = IdentityResolver::load(store).await?;
        let votes = VoteStore::new(
            Arc::new(api.clone()),
            identity.clone(),
            config.vote_cooldown(),
        );
        let subscriptions = SubscriptionManager::new(api.clone(), identity.clone());

        Ok(Self {
            config,
            api,
            identity,
            votes,
            subscriptions,
        })
    }

    /// Network transport and a state file in the configured state directory.
    pub async fn from_config(config: ClientConfig) -> ClientResult<Self> {
        let transport = Arc::new(HttpFetcher::new(config.timeout())?);
        let store = Arc::new(FileStore::in_dir(config.state_dir()?));
        Self::new(config, transport, store).await
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    pub fn votes(&self) -> &VoteStore {
        &self.votes
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// Switch researcher.
    ///
    /// Vote controls are keyed by the previous researcher, so all of them are
    /// discarded; callers remount what they display. The subscription status
    /// is re-read for the new researcher.
    pub async fn select_identity(&self, researcher: impl Into<String>) -> ClientResult<()> {
        let researcher = researcher.into();
        self.identity.set(researcher.clone()).await?;
        self.votes.clear();
        self.subscriptions.refresh().await;
        info!(researcher = %researcher, "researcher selected");
        Ok(())
    }
}
