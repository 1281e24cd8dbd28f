//! Current-actor resolution.
//!
//! The identity is the researcher name chosen by the user. It is persisted
//! under [`IDENTITY_KEY`] and read by every vote mutation. It is a convenience
//! identity only: nothing is validated or authenticated.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::ClientResult;
use crate::storage::{KeyValueStore, MemoryStore};

/// Storage key of the persisted identity.
pub const IDENTITY_KEY: &str = "researcher_id";

#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn KeyValueStore>,
    current: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver").finish_non_exhaustive()
    }
}

impl IdentityResolver {
    /// Read the persisted identity, if any.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> ClientResult<Self> {
        let current = store.load(IDENTITY_KEY).await?.filter(|v| !v.is_empty());
        debug!(present = current.is_some(), "loaded identity");
        Ok(Self {
            store,
            current: Arc::new(RwLock::new(current)),
        })
    }

    /// Unpersisted resolver with no identity.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            current: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn get(&self) -> Option<String> {
        self.current.read().await.clone()
    }

    /// Make `identity` current for this session and persist it.
    ///
    /// The session value is updated even if persisting fails; the error is
    /// still returned.
    pub async fn set(&self, identity: impl Into<String>) -> ClientResult<()> {
        let identity = identity.into();
        *self.current.write().await = Some(identity.clone());
        self.store.save(IDENTITY_KEY, &identity).await?;
        info!(identity = %identity, "identity selected");
        Ok(())
    }
}
