//! Offline routing layer for the grant matcher client.
//!
//! Every outbound request goes through a [`Fetch`] implementation. The
//! [`CacheRouter`] is one that sits in front of the network and decides,
//! per resource class, whether to answer from cache, network, or both:
//!
//! - Cache-first for static assets (pre-cached on install)
//! - Network-first with cache fallback for data files and API reads
//! - Pass-through for state-changing calls, which are never cached
//!
//! Cached entries belong to a [`Generation`]. Activating a generation evicts
//! all others; there is no per-entry expiry.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use ggm_offline::{
//!     CacheRouter, Fetch, Generation, HttpFetcher, MemoryCacheStore, Method, Request,
//!     RoutingRules,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let rules = RoutingRules::for_origins("https://ggm.example", "https://ggm-backend.onrender.com")?;
//! let network = Arc::new(HttpFetcher::new(Duration::from_secs(30))?);
//! let router = CacheRouter::new(rules, network, Arc::new(MemoryCacheStore::new()));
//!
//! let generation = Generation::new(5);
//! router.install(&generation).await?;
//! router.activate(&generation).await?;
//!
//! let response = router
//!     .fetch(Request::parse(Method::GET, "https://ggm.example/data/grants.json")?)
//!     .await?;
//! println!("{} bytes", response.body.len());
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod error;
pub mod fetch;
pub mod generation;
pub mod request;
pub mod router;
pub mod store;

pub use classify::{ResourceClass, RoutingRules, Strategy, DEFAULT_API_ORIGIN};
pub use error::{OfflineError, OfflineResult};
pub use fetch::{Fetch, HttpFetcher, DEFAULT_TIMEOUT_SECS};
pub use generation::Generation;
pub use request::{CacheKey, Request, Response};
pub use router::CacheRouter;
pub use store::{CacheEntry, CacheStore, DiskCacheStore, MemoryCacheStore};

// Re-exported so callers can build requests without a direct reqwest dependency.
pub use reqwest::{header, Method, StatusCode};
pub use url::Url;
