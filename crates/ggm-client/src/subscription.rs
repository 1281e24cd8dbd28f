//! Email subscription for the current researcher.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::client::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::identity::IdentityResolver;
use crate::types::SubscriptionStatus;

/// Tracks whether the current researcher is subscribed to match updates.
#[derive(Debug, Clone)]
pub struct SubscriptionManager {
    api: ApiClient,
    identity: IdentityResolver,
    status: Arc<RwLock<SubscriptionStatus>>,
}

impl SubscriptionManager {
    pub fn new(api: ApiClient, identity: IdentityResolver) -> Self {
        Self {
            api,
            identity,
            status: Arc::new(RwLock::new(SubscriptionStatus::default())),
        }
    }

    /// Last known status.
    pub async fn status(&self) -> SubscriptionStatus {
        self.status.read().await.clone()
    }

    /// Query the service. Any failure reads as "not subscribed".
    pub async fn refresh(&self) -> SubscriptionStatus {
        let status = match self.identity.get().await {
            Some(researcher) => match self.api.subscription_status(&researcher).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(researcher = %researcher, error = %e, "subscription status unavailable");
                    SubscriptionStatus::default()
                }
            },
            None => SubscriptionStatus::default(),
        };
        *self.status.write().await = status.clone();
        status
    }

    /// Subscribe `email`, or unsubscribe it if already subscribed.
    pub async fn submit(&self, email: &str) -> ClientResult<SubscriptionStatus> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ClientError::InvalidInput {
                message: "email is required".to_string(),
            });
        }
        let researcher = self
            .identity
            .get()
            .await
            .ok_or(ClientError::MissingIdentity)?;

        let subscribed = self.status.read().await.subscribed;
        let next = if subscribed {
            self.api.unsubscribe(&researcher, email).await?;
            info!(researcher = %researcher, "unsubscribed");
            SubscriptionStatus::default()
        } else {
            self.api.subscribe(&researcher, email).await?;
            info!(researcher = %researcher, "subscribed");
            SubscriptionStatus {
                subscribed: true,
                email_hint: None,
            }
        };

        *self.status.write().await = next.clone();
        Ok(next)
    }

    /// Forget the tracked status, e.g. after a change of researcher.
    pub async fn reset(&self) {
        *self.status.write().await = SubscriptionStatus::default();
    }
}
