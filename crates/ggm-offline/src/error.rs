//! Error types for the offline routing layer.

/// Routing, transport and cache errors.
#[derive(Debug, thiserror::Error)]
pub enum OfflineError {
    /// No response was obtained (connection refused, DNS, timeout, offline).
    #[error("network error: {message}")]
    Network { message: String },

    /// Cache store I/O failed.
    #[error("cache error: {message}")]
    Cache { message: String },

    /// A manifest entry could not be fetched while installing a generation.
    #[error("install of {generation} failed at {url}: {reason}")]
    InstallFailed {
        generation: String,
        url: String,
        reason: String,
    },

    /// Activation was requested for a generation that never finished installing.
    #[error("generation not installed: {generation}")]
    NotInstalled { generation: String },

    /// The request could not be built or normalized.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl OfflineError {
    /// Whether this is a transport failure (the only kind that triggers cache fallback).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    pub(crate) fn cache(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Cache {
            message: format!("{}: {}", context, err),
        }
    }
}

impl From<reqwest::Error> for OfflineError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Result type for offline operations.
pub type OfflineResult<T> = Result<T, OfflineError>;
