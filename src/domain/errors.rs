use http::StatusCode;
use thiserror::Error;

/// Failures surfaced by the Cloud Files client.
///
/// The sentinel-returning operations log these and swallow them; the `try_*`
/// operations hand them back to the caller.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Identity service answered with unhandled status {0}")]
    AuthRejected(StatusCode),
    #[error("Unexpected response shape: {0}")]
    UnexpectedResponse(String),
    #[error("Client is not authenticated")]
    NotAuthenticated,
    #[error("No {0} endpoint for the configured region")]
    EndpointMissing(&'static str),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("HTTP {status} from {url}")]
    Status { status: StatusCode, url: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid object name: {0}")]
    InvalidObjectName(String),
}

impl StorageError {
    /// HTTP status carried by the error, if the service produced one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::AuthRejected(status) | Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            tracing::warn!(reqwest_timeout = %err);
            StorageError::Transport(format!("Request timeout: {}", err))
        } else if err.is_connect() {
            tracing::warn!(reqwest_connect = %err);
            StorageError::Transport(format!("Connection failed: {}", err))
        } else if err.is_builder() {
            StorageError::InvalidUrl(err.to_string())
        } else {
            tracing::debug!(reqwest_error = %err);
            StorageError::Transport(err.to_string())
        }
    }
}
