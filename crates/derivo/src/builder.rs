//! # Builder for CacheConfig
//!
//! Fluent construction of a [`CacheConfig`] for one caching run.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use derivo_engine::{CacheConfig, ManifestFallback};
//!
//! let config = CacheConfig::builder("public/media")
//!     .with_public_prefix("/media")
//!     .with_access_token("ya29.token")
//!     .with_max_retries(3)
//!     .with_retry_base_delay(Duration::from_secs(1))
//!     .with_item_concurrency(2)
//!     .with_manifest_fallback(ManifestFallback::Rebuild)
//!     .build();
//!
//! assert_eq!(config.item_concurrency, 2);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::config::{CacheConfig, ManifestFallback};
use crate::fetcher::RetryPolicy;

/// Builder for creating CacheConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Create a new builder with default settings for the given cache root
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            config: CacheConfig::new(cache_root),
        }
    }

    /// Set the prefix of the relative URLs recorded in the manifest.
    /// A trailing slash is dropped.
    pub fn with_public_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.config.public_prefix = prefix.trim_end_matches('/').to_owned();
        self
    }

    /// Set the whole retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the number of retries after the first attempt
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.retry.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retry; later retries double it
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    /// Set how many items are rebuilt at the same time (at least 1)
    pub fn with_item_concurrency(mut self, concurrency: usize) -> Self {
        self.config.item_concurrency = concurrency.max(1);
        self
    }

    /// Set the behaviour on a version hit with an unreadable manifest
    pub fn with_manifest_fallback(mut self, fallback: ManifestFallback) -> Self {
        self.config.manifest_fallback = fallback;
        self
    }

    /// Set the bearer credential sent to the remote service
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.config.http.access_token = Some(token.into());
        self
    }

    /// Set the overall timeout for one HTTP request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.timeout = timeout;
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.connect_timeout = timeout;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.http.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.http.headers.insert(name, value);
        }
        self
    }

    /// Merge headers over the defaults; later values win
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.config.http.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Set whether to follow redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.http.follow_redirects = follow;
        self
    }

    /// Build the CacheConfig instance
    pub fn build(self) -> CacheConfig {
        self.config
    }
}
