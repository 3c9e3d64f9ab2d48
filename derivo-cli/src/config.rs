use std::time::Duration;

use derivo_engine::{CacheConfig, ManifestFallback};

use crate::cli::{CliArgs, ManifestFallbackArg};
use crate::utils::parse_headers;

impl From<ManifestFallbackArg> for ManifestFallback {
    fn from(arg: ManifestFallbackArg) -> Self {
        match arg {
            ManifestFallbackArg::Rebuild => ManifestFallback::Rebuild,
            ManifestFallbackArg::Empty => ManifestFallback::Empty,
        }
    }
}

/// Map the command line onto the cache configuration
pub fn cache_config(args: &CliArgs) -> CacheConfig {
    let mut builder = CacheConfig::builder(&args.cache_root)
        .with_public_prefix(&args.public_prefix)
        .with_item_concurrency(args.item_concurrency)
        .with_max_retries(args.max_retries)
        .with_retry_base_delay(Duration::from_millis(args.retry_base_delay_ms))
        .with_manifest_fallback(args.manifest_fallback.into())
        .with_timeout(Duration::from_secs(args.timeout))
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_headers(parse_headers(&args.headers));

    if let Some(user_agent) = &args.user_agent {
        builder = builder.with_user_agent(user_agent);
    }

    if let Some(token) = &args.token {
        builder = builder.with_access_token(token);
    }

    builder.build()
}
