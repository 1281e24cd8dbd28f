//! Cache stores.
//!
//! A store holds named generations, each a map from [`CacheKey`] to a captured
//! response. Stores know nothing about which generation is current; the
//! [`CacheRouter`](crate::CacheRouter) decides what may be served.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use url::Url;

use crate::error::OfflineResult;
use crate::request::{CacheKey, Response};

mod disk;
mod memory;

pub use disk::DiskCacheStore;
pub use memory::MemoryCacheStore;

/// A captured response tagged with the generation it belongs to.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub generation: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub url: Url,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Capture a clone of `response` under `key`.
    pub fn capture(key: CacheKey, generation: impl Into<String>, response: &Response) -> Self {
        Self {
            key,
            generation: generation.into(),
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.clone(),
            url: response.url.clone(),
            stored_at: Utc::now(),
        }
    }

    pub fn to_response(&self) -> Response {
        Response {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
            url: self.url.clone(),
        }
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Names of all generations present in the store.
    async fn generations(&self) -> OfflineResult<Vec<String>>;

    /// Create an empty generation (no-op if it exists).
    async fn create_generation(&self, generation: &str) -> OfflineResult<()>;

    /// Delete a generation and all its entries. Returns whether it existed.
    async fn delete_generation(&self, generation: &str) -> OfflineResult<bool>;

    /// Keys stored in a generation.
    async fn keys(&self, generation: &str) -> OfflineResult<Vec<CacheKey>>;

    async fn get(&self, generation: &str, key: &CacheKey) -> OfflineResult<Option<CacheEntry>>;

    /// Insert or replace an entry in `entry.generation`, creating it if needed.
    async fn put(&self, entry: CacheEntry) -> OfflineResult<()>;
}
