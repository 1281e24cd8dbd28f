//! Error types for the client.

use ggm_offline::OfflineError;

/// Client errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No response was obtained from the remote service.
    #[error("network error: {message}")]
    Transport { message: String },

    /// The service answered with a non-success status other than 404.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// A body that should be JSON could not be parsed.
    #[error("malformed response: {message}")]
    Malformed { message: String },

    /// A mutation was attempted before any identity was selected.
    #[error("no researcher selected")]
    MissingIdentity,

    /// Persisted state could not be read or written (client storage or the offline cache).
    #[error("storage error: {message}")]
    Storage { message: String },

    /// User input rejected before any request was made.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A vote could not be registered; local state has been rolled back.
    #[error("vote on grant {grant_id} rejected: {message}")]
    VoteRejected { grant_id: String, message: String },
}

impl ClientError {
    /// Whether no response was obtained at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Short text suitable for showing to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::VoteRejected { .. } => "Couldn't register vote - please try again.",
            Self::MissingIdentity => "Select a researcher first.",
            Self::Transport { .. } => "Network unavailable - please try again.",
            Self::InvalidInput { .. } => "Please check your input and try again.",
            _ => "Something went wrong - please try again.",
        }
    }
}

impl From<OfflineError> for ClientError {
    fn from(err: OfflineError) -> Self {
        match err {
            OfflineError::Network { message } => Self::Transport { message },
            OfflineError::InvalidRequest { message } => Self::Config { message },
            other @ (OfflineError::Cache { .. }
            | OfflineError::InstallFailed { .. }
            | OfflineError::NotInstalled { .. }) => Self::Storage {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
