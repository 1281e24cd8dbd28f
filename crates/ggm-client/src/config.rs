//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the vote/subscription service.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Window after a vote toggle during which further toggles on the same
    /// grant are dropped while the first is still pending.
    #[serde(default = "default_vote_cooldown_ms")]
    pub vote_cooldown_ms: u64,

    /// Directory for persisted client state. Platform data dir when unset.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

fn default_api_url() -> String {
    ggm_offline::DEFAULT_API_ORIGIN.to_string()
}

fn default_timeout() -> u64 {
    ggm_offline::DEFAULT_TIMEOUT_SECS
}

fn default_vote_cooldown_ms() -> u64 {
    300
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout(),
            vote_cooldown_ms: default_vote_cooldown_ms(),
            state_dir: None,
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `GGM_API_URL` | Vote/subscription service base URL |
    /// | `GGM_TIMEOUT` | Request timeout in seconds (default: 30) |
    /// | `GGM_VOTE_COOLDOWN_MS` | Vote toggle cool-down (default: 300) |
    /// | `GGM_STATE_DIR` | Directory for persisted identity |
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("GGM_API_URL").unwrap_or_else(|_| default_api_url()),
            timeout_secs: std::env::var("GGM_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_timeout),
            vote_cooldown_ms: std::env::var("GGM_VOTE_COOLDOWN_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_vote_cooldown_ms),
            state_dir: std::env::var("GGM_STATE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Set the API base URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_vote_cooldown(mut self, cooldown: Duration) -> Self {
        self.vote_cooldown_ms = cooldown.as_millis() as u64;
        self
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn vote_cooldown(&self) -> Duration {
        Duration::from_millis(self.vote_cooldown_ms)
    }

    /// Resolved state directory.
    ///
    /// Default: `~/.local/share/ggm`
    pub fn state_dir(&self) -> ClientResult<PathBuf> {
        if let Some(dir) = &self.state_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .map(|base| base.join("ggm"))
            .ok_or_else(|| ClientError::Config {
                message: "could not determine state directory".to_string(),
            })
    }
}
