//! Request-routing cache controller.
//!
//! Resolution per [`ResourceClass`]:
//!
//! | Class | Strategy |
//! |-------|----------|
//! | static-asset | cache-first, populate on 2xx miss |
//! | data-file, read-api-call | network-first, refresh on 2xx, fall back to cache on transport failure |
//! | mutating-api-call, external | pass-through, cache never consulted |
//!
//! A non-2xx response is returned as-is and never triggers the fallback;
//! only a transport failure does.
//!
//! Only the active generation is ever read. [`CacheRouter::activate`] deletes
//! every other generation in the store.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::classify::{RoutingRules, Strategy};
use crate::error::{OfflineError, OfflineResult};
use crate::fetch::Fetch;
use crate::generation::Generation;
use crate::request::{CacheKey, Request, Response};
use crate::store::{CacheEntry, CacheStore};

#[derive(Debug, Default)]
struct RouterState {
    active: Option<Generation>,
    installed: HashSet<String>,
}

/// Intercepts requests and resolves them via cache and/or network.
pub struct CacheRouter {
    rules: RoutingRules,
    network: Arc<dyn Fetch>,
    store: Arc<dyn CacheStore>,
    state: RwLock<RouterState>,
}

impl std::fmt::Debug for CacheRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRouter")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl CacheRouter {
    pub fn new(rules: RoutingRules, network: Arc<dyn Fetch>, store: Arc<dyn CacheStore>) -> Self {
        Self {
            rules,
            network,
            store,
            state: RwLock::new(RouterState::default()),
        }
    }

    pub fn rules(&self) -> &RoutingRules {
        &self.rules
    }

    /// The generation currently serving traffic.
    pub async fn active_generation(&self) -> Option<Generation> {
        self.state.read().await.active.clone()
    }

    async fn active_name(&self) -> Option<String> {
        self.state.read().await.active.as_ref().map(Generation::name)
    }

    /// Pre-populate `generation` with every static asset of the manifest.
    ///
    /// All-or-nothing: the first asset that cannot be fetched with a 2xx
    /// status aborts the install and deletes what was stored so far. The
    /// active generation, if any, keeps serving either way.
    pub async fn install(&self, generation: &Generation) -> OfflineResult<()> {
        let name = generation.name();
        let urls = self.rules.manifest_urls()?;
        info!(generation = %name, assets = urls.len(), "installing cache generation");

        self.store.create_generation(&name).await?;

        for url in urls {
            let request = Request::get(url.clone());
            let key = request.cache_key();

            let outcome = match self.network.fetch(request).await {
                Ok(response) if response.is_success() => self
                    .store
                    .put(CacheEntry::capture(key, name.as_str(), &response))
                    .await
                    .map_err(|e| e.to_string()),
                Ok(response) => Err(format!("HTTP {}", response.status.as_u16())),
                Err(e) => Err(e.to_string()),
            };

            if let Err(reason) = outcome {
                warn!(generation = %name, url = %url, reason = %reason, "cache install failed");
                self.discard_failed_install(&name).await;
                return Err(OfflineError::InstallFailed {
                    generation: name,
                    url: url.to_string(),
                    reason,
                });
            }
        }

        self.state.write().await.installed.insert(name.clone());
        info!(generation = %name, "cache generation installed");
        Ok(())
    }

    async fn discard_failed_install(&self, name: &str) {
        if self.active_name().await.as_deref() == Some(name) {
            // Reinstalling the serving generation: keep what it had.
            return;
        }
        if let Err(e) = self.store.delete_generation(name).await {
            warn!(generation = %name, error = %e, "failed to discard partial install");
        }
    }

    /// Make an installed generation current and delete every other one.
    ///
    /// Returns the number of generations evicted.
    pub async fn activate(&self, generation: &Generation) -> OfflineResult<usize> {
        let name = generation.name();
        {
            let mut state = self.state.write().await;
            if !state.installed.contains(&name) {
                return Err(OfflineError::NotInstalled { generation: name });
            }
            state.active = Some(generation.clone());
        }

        let mut evicted = 0;
        for other in self.store.generations().await? {
            if other != name && self.store.delete_generation(&other).await? {
                evicted += 1;
            }
        }
        self.state.write().await.installed.retain(|n| n == &name);

        let entries = self.store.keys(&name).await?.len();
        info!(generation = %name, evicted, entries, "cache generation activated");
        Ok(evicted)
    }

    /// Adopt a generation a previous process installed into a persistent store.
    ///
    /// Returns `false` (and changes nothing) when the store does not have it,
    /// or has it without every manifest entry (an install that never finished).
    pub async fn resume(&self, generation: &Generation) -> OfflineResult<bool> {
        let name = generation.name();
        if !self.store.generations().await?.contains(&name) {
            return Ok(false);
        }

        let stored: HashSet<CacheKey> = self.store.keys(&name).await?.into_iter().collect();
        let missing = self
            .rules
            .manifest_urls()?
            .into_iter()
            .filter(|url| !stored.contains(&Request::get(url.clone()).cache_key()))
            .count();
        if missing > 0 {
            warn!(generation = %name, missing, "stored generation is incomplete, not resuming");
            return Ok(false);
        }
        self.state.write().await.installed.insert(name);
        self.activate(generation).await?;
        Ok(true)
    }

    /// Resolve a request according to its resource class.
    pub async fn route(&self, request: Request) -> OfflineResult<Response> {
        let class = self.rules.classify(&request);
        debug!(class = %class, method = %request.method, url = %request.url, "routing request");

        match class.strategy() {
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::PassThrough => self.network.fetch(request).await,
        }
    }

    async fn cache_first(&self, request: Request) -> OfflineResult<Response> {
        let key = request.cache_key();

        if let Some(cached) = self.lookup(&key).await {
            debug!(key = %key, "cache hit");
            return Ok(cached);
        }
        debug!(key = %key, "cache miss");

        let response = self.network.fetch(request).await?;
        if response.is_success() {
            self.store_clone(key, &response).await;
        }
        Ok(response)
    }

    async fn network_first(&self, request: Request) -> OfflineResult<Response> {
        let key = request.cache_key();

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store_clone(key, &response).await;
                }
                Ok(response)
            }
            Err(err) if err.is_transport() => match self.lookup(&key).await {
                Some(cached) => {
                    warn!(key = %key, error = %err, "network failed, serving cached copy");
                    Ok(cached)
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Read from the active generation only. Store errors count as a miss.
    async fn lookup(&self, key: &CacheKey) -> Option<Response> {
        let generation = self.active_name().await?;
        match self.store.get(&generation, key).await {
            Ok(entry) => entry.map(|e| e.to_response()),
            Err(e) => {
                warn!(key = %key, error = %e, "cache read failed");
                None
            }
        }
    }

    async fn store_clone(&self, key: CacheKey, response: &Response) {
        // Re-read: an activation may have happened while the fetch was in flight.
        let Some(generation) = self.active_name().await else {
            return;
        };
        let entry = CacheEntry::capture(key, generation, response);
        if let Err(e) = self.store.put(entry).await {
            warn!(error = %e, "cache write failed");
        }
    }
}

#[async_trait]
impl Fetch for CacheRouter {
    async fn fetch(&self, request: Request) -> OfflineResult<Response> {
        self.route(request).await
    }
}
