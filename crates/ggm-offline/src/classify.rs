//! Static resource classification.
//!
//! Every request is tagged with a [`ResourceClass`] from fixed routing rules
//! (origin, method and enumerated paths). Nothing about the response content
//! influences the class.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{OfflineError, OfflineResult};
use crate::request::Request;

/// Origin of the remote vote/subscription service.
pub const DEFAULT_API_ORIGIN: &str = "https://ggm-backend.onrender.com";

/// Assets pre-cached on install and served cache-first.
pub const DEFAULT_STATIC_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/styles.css",
    "/script.js",
    "/teaser.js",
];

/// Catalog data files, served network-first.
pub const DEFAULT_DATA_FILES: &[&str] = &[
    "/data/grants.json",
    "/data/reranked_matches.json",
    "/data/affiliation_dict.json",
    "/data/matches.json",
    "/data/collaborations.json",
];

/// Caching bucket of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    StaticAsset,
    DataFile,
    ReadApiCall,
    /// State-changing call; never cached.
    MutatingApiCall,
    /// Foreign origin; not intercepted.
    External,
}

/// How a class is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    PassThrough,
}

impl ResourceClass {
    pub fn strategy(self) -> Strategy {
        match self {
            Self::StaticAsset => Strategy::CacheFirst,
            Self::DataFile | Self::ReadApiCall => Strategy::NetworkFirst,
            Self::MutatingApiCall | Self::External => Strategy::PassThrough,
        }
    }
}

impl std::fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::StaticAsset => "static-asset",
            Self::DataFile => "data-file",
            Self::ReadApiCall => "read-api-call",
            Self::MutatingApiCall => "mutating-api-call",
            Self::External => "external",
        };
        f.write_str(name)
    }
}

/// Routing rules fixed at deployment time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRules {
    /// Origin serving the application shell and data files.
    pub app_origin: Url,

    /// Origin of the remote API.
    pub api_origin: Url,

    /// Paths pre-cached on install.
    #[serde(default)]
    pub static_assets: Vec<String>,

    /// Exact data file paths.
    #[serde(default)]
    pub data_files: Vec<String>,

    /// Path prefixes that mark a data file.
    #[serde(default)]
    pub data_prefixes: Vec<String>,

    /// API paths that change state despite using GET.
    #[serde(default)]
    pub mutating_get_paths: Vec<String>,
}

impl RoutingRules {
    /// Rules for the deployed manifest on the given origins.
    pub fn new(app_origin: Url, api_origin: Url) -> Self {
        Self {
            app_origin,
            api_origin,
            static_assets: DEFAULT_STATIC_ASSETS.iter().map(|s| s.to_string()).collect(),
            data_files: DEFAULT_DATA_FILES.iter().map(|s| s.to_string()).collect(),
            data_prefixes: vec!["/data/".to_string()],
            mutating_get_paths: vec!["/unsubscribe".to_string()],
        }
    }

    /// Parse both origins from strings.
    pub fn for_origins(app_origin: &str, api_origin: &str) -> OfflineResult<Self> {
        let parse = |value: &str| {
            Url::parse(value).map_err(|e| OfflineError::InvalidRequest {
                message: format!("invalid origin {}: {}", value, e),
            })
        };
        Ok(Self::new(parse(app_origin)?, parse(api_origin)?))
    }

    pub fn with_static_assets(mut self, assets: Vec<String>) -> Self {
        self.static_assets = assets;
        self
    }

    pub fn with_data_files(mut self, files: Vec<String>) -> Self {
        self.data_files = files;
        self
    }

    pub fn classify(&self, request: &Request) -> ResourceClass {
        if !matches!(request.method, Method::GET | Method::HEAD) {
            return ResourceClass::MutatingApiCall;
        }

        let origin = request.url.origin();
        let path = request.url.path();

        if origin == self.api_origin.origin() {
            if self.mutating_get_paths.iter().any(|p| p == path) {
                ResourceClass::MutatingApiCall
            } else {
                ResourceClass::ReadApiCall
            }
        } else if origin == self.app_origin.origin() {
            let is_data = self.data_files.iter().any(|p| p == path)
                || self.data_prefixes.iter().any(|p| path.starts_with(p.as_str()));
            if is_data {
                ResourceClass::DataFile
            } else {
                ResourceClass::StaticAsset
            }
        } else {
            ResourceClass::External
        }
    }

    /// Absolute URLs of the install manifest.
    pub fn manifest_urls(&self) -> OfflineResult<Vec<Url>> {
        self.static_assets
            .iter()
            .map(|path| {
                self.app_origin
                    .join(path)
                    .map_err(|e| OfflineError::InvalidRequest {
                        message: format!("invalid manifest path {}: {}", path, e),
                    })
            })
            .collect()
    }
}
