//! Filesystem cache store.
//!
//! # Layout
//!
//! ```text
//! {root}/{generation}/{sha256(key)[..32]}/
//!   body             # Response body
//!   metadata.json    # Key, status, headers, URL, stored_at
//! ```
//!
//! The body is written before the metadata, each through a temp file and a
//! rename, so a readable `metadata.json` always has its body next to it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};
use url::Url;

use crate::error::{OfflineError, OfflineResult};
use crate::request::CacheKey;

use super::{CacheEntry, CacheStore};

const METADATA_FILE: &str = "metadata.json";
const BODY_FILE: &str = "body";

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: CacheKey,
    status: u16,
    #[serde(default)]
    headers: Vec<(String, String)>,
    url: String,
    stored_at: DateTime<Utc>,
}

/// Cache store persisted under a root directory.
#[derive(Debug, Clone)]
pub struct DiskCacheStore {
    root: PathBuf,
}

impl DiskCacheStore {
    /// Store in the platform cache directory.
    ///
    /// Default: `~/.cache/ggm/offline`
    pub fn new() -> OfflineResult<Self> {
        let base = dirs::cache_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| OfflineError::Cache {
                message: "could not determine cache directory".to_string(),
            })?;
        Ok(Self::with_dir(base.join("ggm").join("offline")))
    }

    pub fn with_dir(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generation_dir(&self, generation: &str) -> PathBuf {
        self.root.join(generation)
    }

    fn entry_dir(&self, generation: &str, key: &CacheKey) -> PathBuf {
        let digest = Sha256::digest(key.as_str().as_bytes());
        let name = hex::encode(digest);
        self.generation_dir(generation).join(&name[..32])
    }

    async fn read_entry(&self, generation: &str, dir: &Path) -> OfflineResult<Option<CacheEntry>> {
        let meta_bytes = match fs::read(dir.join(METADATA_FILE)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(OfflineError::cache("failed to read metadata", e)),
        };
        let meta: EntryMeta = serde_json::from_slice(&meta_bytes)
            .map_err(|e| OfflineError::cache("failed to parse metadata", e))?;
        let body = fs::read(dir.join(BODY_FILE))
            .await
            .map_err(|e| OfflineError::cache("failed to read body", e))?;

        let status = StatusCode::from_u16(meta.status)
            .map_err(|e| OfflineError::cache("invalid cached status", e))?;
        let url =
            Url::parse(&meta.url).map_err(|e| OfflineError::cache("invalid cached URL", e))?;

        Ok(Some(CacheEntry {
            key: meta.key,
            generation: generation.to_string(),
            status,
            headers: headers_from_pairs(&meta.headers),
            body: Bytes::from(body),
            url,
            stored_at: meta.stored_at,
        }))
    }
}

#[async_trait]
impl CacheStore for DiskCacheStore {
    async fn generations(&self) -> OfflineResult<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(OfflineError::cache("failed to list generations", e)),
        };

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| OfflineError::cache("failed to list generations", e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn create_generation(&self, generation: &str) -> OfflineResult<()> {
        fs::create_dir_all(self.generation_dir(generation))
            .await
            .map_err(|e| OfflineError::cache("failed to create generation", e))
    }

    async fn delete_generation(&self, generation: &str) -> OfflineResult<bool> {
        let dir = self.generation_dir(generation);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)
            .await
            .map_err(|e| OfflineError::cache("failed to delete generation", e))?;
        debug!(generation, "deleted cache generation");
        Ok(true)
    }

    async fn keys(&self, generation: &str) -> OfflineResult<Vec<CacheKey>> {
        let mut keys = Vec::new();
        let mut dir = match fs::read_dir(self.generation_dir(generation)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(OfflineError::cache("failed to list entries", e)),
        };

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| OfflineError::cache("failed to list entries", e))?
        {
            match self.read_entry(generation, &entry.path()).await {
                Ok(Some(cached)) => keys.push(cached.key),
                Ok(None) => {}
                Err(e) => warn!(error = %e, path = %entry.path().display(), "skipping unreadable cache entry"),
            }
        }

        Ok(keys)
    }

    async fn get(&self, generation: &str, key: &CacheKey) -> OfflineResult<Option<CacheEntry>> {
        let dir = self.entry_dir(generation, key);
        match self.read_entry(generation, &dir).await? {
            // Guard against digest prefix collisions.
            Some(entry) if &entry.key == key => Ok(Some(entry)),
            Some(_) => Ok(None),
            None => Ok(None),
        }
    }

    async fn put(&self, entry: CacheEntry) -> OfflineResult<()> {
        let dir = self.entry_dir(&entry.generation, &entry.key);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| OfflineError::cache("failed to create entry directory", e))?;

        let meta = EntryMeta {
            key: entry.key.clone(),
            status: entry.status.as_u16(),
            headers: headers_to_pairs(&entry.headers),
            url: entry.url.to_string(),
            stored_at: entry.stored_at,
        };
        let meta_json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| OfflineError::cache("failed to serialize metadata", e))?;

        write_atomic(&dir.join(BODY_FILE), &entry.body).await?;
        write_atomic(&dir.join(METADATA_FILE), &meta_json).await?;

        debug!(generation = %entry.generation, key = %entry.key, "stored cache entry");
        Ok(())
    }
}

async fn write_atomic(path: &Path, content: &[u8]) -> OfflineResult<()> {
    let temp_path = path.with_extension("tmp");

    fs::write(&temp_path, content)
        .await
        .map_err(|e| OfflineError::cache("failed to write temp file", e))?;

    fs::rename(&temp_path, path)
        .await
        .map_err(|e| OfflineError::cache("failed to rename temp file", e))?;

    Ok(())
}

fn headers_to_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn headers_from_pairs(pairs: &[(String, String)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    headers
}
