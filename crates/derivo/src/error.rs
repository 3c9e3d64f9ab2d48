use std::path::PathBuf;

use reqwest::StatusCode;

/// Failure of a single derivative retrieval.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned status code {0}")]
    Status(StatusCode),

    #[error("Server returned an empty body")]
    EmptyBody,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Whether retrying the same request may succeed.
    ///
    /// Transport failures, `429 Too Many Requests` and every 5xx are
    /// transient. Other statuses, empty bodies and malformed URLs are not.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Status(status) => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            FetchError::EmptyBody | FetchError::InvalidUrl(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Status(status),
            None => FetchError::Network(err.to_string()),
        }
    }
}

/// Failure to produce one (item, role) derivative.
#[derive(Debug, thiserror::Error)]
pub enum DerivativeError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("No file extension known for content type {0:?}")]
    UnknownContentType(Option<String>),

    #[error("Write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// Manifest or version marker persistence failure.
///
/// Never fatal on its own: the store reports it as a degraded outcome.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed manifest {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that abort a whole caching run.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Failed to reset cache root {path}: {source}")]
    Structural {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// A lister record the media model cannot represent.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Media item {id}: {reason}")]
    InvalidItem { id: String, reason: String },

    #[error("Malformed media item list: {0}")]
    Json(#[from] serde_json::Error),
}

impl IngestError {
    pub(crate) fn invalid(id: impl Into<String>, reason: impl Into<String>) -> Self {
        IngestError::InvalidItem {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
