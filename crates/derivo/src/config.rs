use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::fetcher::RetryPolicy;

const DEFAULT_USER_AGENT: &str = concat!("derivo/", env!("CARGO_PKG_VERSION"));

/// Public URL prefix the cache root is served under.
pub const DEFAULT_PUBLIC_PREFIX: &str = "/media";

/// What to do when the version marker matches but the manifest cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifestFallback {
    /// Treat the cache as stale and rebuild it
    #[default]
    Rebuild,
    /// Return no items for this run and leave the cache untouched
    Empty,
}

/// HTTP settings for the derivative transport
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Overall timeout for one request, zero disables it
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Default headers sent with every request
    pub headers: HeaderMap,

    /// Bearer credential supplied by the caller, if the service needs one
    pub access_token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: HttpConfig::get_default_headers(),
            access_token: None,
        }
    }
}

impl HttpConfig {
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("image/*,video/*;q=0.9,*/*;q=0.8"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers
    }
}

/// Configuration of one caching run.
///
/// Passed explicitly to [`crate::MediaCache`]; nothing is read from globals.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding `version.txt`, `config.json` and the role folders
    pub cache_root: PathBuf,

    /// Prefix of the relative URLs recorded in the manifest
    pub public_prefix: String,

    /// Backoff policy for derivative fetches
    pub retry: RetryPolicy,

    /// Number of items rebuilt at the same time; 1 keeps the rebuild strictly
    /// sequential and bounds the burst load on the remote service
    pub item_concurrency: usize,

    /// Behaviour on a version hit with an unreadable manifest
    pub manifest_fallback: ManifestFallback,

    /// Transport settings
    pub http: HttpConfig,
}

impl CacheConfig {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            public_prefix: DEFAULT_PUBLIC_PREFIX.to_owned(),
            retry: RetryPolicy::default(),
            item_concurrency: 1,
            manifest_fallback: ManifestFallback::default(),
            http: HttpConfig::default(),
        }
    }

    pub fn builder(cache_root: impl Into<PathBuf>) -> crate::builder::CacheConfigBuilder {
        crate::builder::CacheConfigBuilder::new(cache_root)
    }
}
