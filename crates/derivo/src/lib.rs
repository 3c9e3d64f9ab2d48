//! # Derivo
//!
//! A library for caching resolution-specific derivatives of remote media
//! collections. Thumbnails, timeline and fullscreen renditions, plus the raw
//! stream of ready videos, are fetched from a remote image-transform service
//! and persisted under a cache root keyed by a fingerprint of the whole
//! collection.
//!
//! ## Features
//!
//! - Whole-collection fingerprinting, so fetch work only happens when
//!   membership changes
//! - Retrying fetches with bounded exponential backoff
//! - Fail-closed per item: partial derivative sets are never served
//! - Degraded-mode manifest persistence that never blocks a run

pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod fingerprint;
pub mod manifest;
pub mod media;
pub mod role;
pub mod transport;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_utils;

pub use builder::CacheConfigBuilder;
pub use cache::{CacheOutcome, CacheRun, MediaCache, RebuildStats};
pub use config::{CacheConfig, HttpConfig, ManifestFallback};
pub use error::{CacheError, DerivativeError, FetchError, IngestError, StoreError};
pub use fetcher::{RetryPolicy, RetryingFetcher};
pub use fingerprint::fingerprint;
pub use manifest::{
    CacheEntry, CacheManifest, DerivativeRecord, ManifestStore, Persisted, PhotoCache, StoreRead,
    VideoCache, VideoRecord,
};
pub use media::{
    CachedMediaItem, MediaItem, MediaKind, MediaListing, PhotoMetadata, RawMediaItem,
    VideoMetadata, VideoStatus, parse_media_items,
};
pub use role::DerivativeRole;
pub use transport::{DerivativeTransport, FetchedMedia, HttpTransport, create_client};
pub use writer::{DerivativeWriter, extension_for_content_type};
