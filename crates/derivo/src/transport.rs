//! # Derivative Transport
//!
//! The seam between the pipeline and the remote image-transform service. A
//! transport performs exactly one request per call; retrying is the
//! [`RetryingFetcher`](crate::RetryingFetcher)'s job.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use tracing::debug;
use url::Url;

use crate::config::HttpConfig;
use crate::error::{CacheError, FetchError};

/// Body and content type of a successful retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMedia {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// One-shot retrieval of a derivative by its parameterized locator.
///
/// Requests must be idempotent: the fetcher may issue the same one several
/// times.
#[async_trait]
pub trait DerivativeTransport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia, FetchError>;
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &HttpConfig) -> Result<Client, CacheError> {
    let mut headers = config.headers.clone();

    if let Some(token) = &config.access_token {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| CacheError::Client(format!("invalid access token: {e}")))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(5)
        .user_agent(&config.user_agent)
        .default_headers(headers)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    client_builder
        .build()
        .map_err(|e| CacheError::Client(e.to_string()))
}

/// [`DerivativeTransport`] over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, CacheError> {
        Ok(Self {
            client: create_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DerivativeTransport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia, FetchError> {
        let url = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(FetchError::EmptyBody);
        }

        debug!(
            url = %url,
            size = bytes.len(),
            content_type = content_type.as_deref().unwrap_or("-"),
            "Fetched derivative"
        );

        Ok(FetchedMedia {
            bytes,
            content_type,
        })
    }
}
