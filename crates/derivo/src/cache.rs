//! # Media Cache
//!
//! Orchestrates one caching run over a collection:
//!
//! ```text
//! CHECK_VERSION ──hit──> LOAD ────> DONE
//!       │                 │
//!       └──miss──> REBUILD <┘ (unreadable manifest, if configured)
//! ```
//!
//! A rebuild wipes the cache root and processes the items with bounded
//! concurrency (one at a time by default). The derivatives of one item are
//! fetched together and the item is only recorded when every required one
//! was written.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::{CacheConfig, ManifestFallback};
use crate::error::{CacheError, DerivativeError};
use crate::fetcher::RetryingFetcher;
use crate::fingerprint::fingerprint;
use crate::manifest::{
    CacheEntry, CacheManifest, DerivativeRecord, ManifestStore, Persisted, PhotoCache, StoreRead,
    VideoCache, VideoRecord,
};
use crate::media::{CachedMediaItem, MediaItem, MediaKind};
use crate::role::DerivativeRole;
use crate::transport::{DerivativeTransport, HttpTransport};
use crate::writer::{DerivativeWriter, extension_for_content_type};

/// Bookkeeping of a rebuild.
#[derive(Debug)]
pub struct RebuildStats {
    pub requested: usize,
    pub cached: usize,
    pub dropped: usize,
    pub manifest: Persisted,
    pub version: Persisted,
}

#[derive(Debug)]
pub enum CacheOutcome {
    /// Version matched; items were joined with the stored manifest
    Hit,
    /// Version mismatched (or the manifest was unusable); the cache was rebuilt
    Rebuilt(RebuildStats),
    /// Version matched but the manifest could not be read; nothing is served
    /// for this run
    Unavailable,
}

/// Result of [`MediaCache::cache_items`].
#[derive(Debug)]
pub struct CacheRun {
    /// Fingerprint of the requested collection
    pub version: String,
    pub outcome: CacheOutcome,
    /// Cached items, in request order
    pub items: Vec<CachedMediaItem>,
}

/// Derivative cache over one cache root.
///
/// Rebuilds own the cache root exclusively; running two against the same
/// root at once must be prevented by the caller.
pub struct MediaCache {
    config: Arc<CacheConfig>,
    fetcher: RetryingFetcher,
    writer: DerivativeWriter,
    store: ManifestStore,
}

impl MediaCache {
    /// Create a cache fetching over HTTP.
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let transport = HttpTransport::new(&config.http)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a cache fetching through a custom transport.
    pub fn with_transport(config: CacheConfig, transport: Arc<dyn DerivativeTransport>) -> Self {
        let fetcher = RetryingFetcher::new(transport, config.retry);
        let writer = DerivativeWriter::new(&config.cache_root, config.public_prefix.clone());
        let store = ManifestStore::new(&config.cache_root);

        Self {
            config: Arc::new(config),
            fetcher,
            writer,
            store,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached form of `items`, rebuilding the cache first when the
    /// collection's membership changed.
    ///
    /// Items whose derivatives cannot all be produced are left out. The only
    /// error is a failure to reset the cache root.
    pub async fn cache_items(&self, items: &[MediaItem]) -> Result<CacheRun, CacheError> {
        let version = fingerprint(items.iter().map(|item| item.id.as_str()));

        let cached_version = match self.store.read_version().await {
            StoreRead::Found(v) => Some(v),
            StoreRead::Missing => None,
            StoreRead::Unreadable(e) => {
                warn!(error = %e, "Version marker unreadable, treating cache as stale");
                None
            }
        };

        if cached_version.as_deref() != Some(version.as_str()) {
            info!(
                version = %version,
                cached = cached_version.as_deref().unwrap_or("-"),
                items = items.len(),
                "Media cache miss, rebuilding"
            );
            return self.rebuild(items, version).await;
        }

        match self.store.read_manifest().await {
            StoreRead::Found(manifest) => {
                let cached = join_manifest(items, &manifest);
                info!(
                    version = %version,
                    requested = items.len(),
                    cached = cached.len(),
                    "Media cache hit"
                );
                Ok(CacheRun {
                    version,
                    outcome: CacheOutcome::Hit,
                    items: cached,
                })
            }
            StoreRead::Missing | StoreRead::Unreadable(_) => match self.config.manifest_fallback {
                ManifestFallback::Rebuild => {
                    warn!(version = %version, "Manifest unusable on cache hit, rebuilding");
                    self.rebuild(items, version).await
                }
                ManifestFallback::Empty => {
                    warn!(version = %version, "Manifest unusable on cache hit, serving no items");
                    Ok(CacheRun {
                        version,
                        outcome: CacheOutcome::Unavailable,
                        items: Vec::new(),
                    })
                }
            },
        }
    }

    async fn rebuild(&self, items: &[MediaItem], version: String) -> Result<CacheRun, CacheError> {
        if let Err(e) = self.store.reset_cache_root().await {
            error!(error = %e, "Aborting media cache rebuild");
            return Err(e);
        }

        let entries: Vec<Option<CacheEntry>> = stream::iter(items)
            .map(|item| {
                self.cache_item(item)
                    .instrument(info_span!("cache_item", id = %item.id))
            })
            .buffered(self.config.item_concurrency.max(1))
            .collect()
            .await;

        let mut manifest = CacheManifest::new();
        let mut cached = Vec::with_capacity(items.len());
        for (item, entry) in items.iter().zip(entries) {
            if let Some(entry) = entry {
                manifest.insert(item.id.clone(), entry.clone());
                cached.push(CachedMediaItem {
                    item: item.clone(),
                    cache: entry,
                });
            }
        }

        // Version goes last: a crash in between leaves a mismatch behind.
        let manifest_persisted = self.store.write_manifest(&manifest).await;
        let version_persisted = self.store.write_version(&version).await;

        let stats = RebuildStats {
            requested: items.len(),
            cached: cached.len(),
            dropped: items.len() - cached.len(),
            manifest: manifest_persisted,
            version: version_persisted,
        };
        info!(
            version = %version,
            requested = stats.requested,
            cached = stats.cached,
            dropped = stats.dropped,
            manifest_stored = stats.manifest.is_stored(),
            version_stored = stats.version.is_stored(),
            "Media cache rebuilt"
        );

        Ok(CacheRun {
            version,
            outcome: CacheOutcome::Rebuilt(stats),
            items: cached,
        })
    }

    /// Produce every derivative `item` needs, or nothing.
    async fn cache_item(&self, item: &MediaItem) -> Option<CacheEntry> {
        match &item.kind {
            MediaKind::Photo(_) => self.cache_photo_set(item).await.map(CacheEntry::Photo),
            MediaKind::Video(_) => {
                let poster_photo = self.cache_photo_set(item).await?;

                if !item.is_video_ready() {
                    debug!("Video is not ready on the remote service, skipping");
                    return None;
                }

                match self.cache_file(item, DerivativeRole::Video).await {
                    Ok(url) => Some(CacheEntry::Video(VideoCache {
                        video: VideoRecord { url },
                        poster_photo,
                    })),
                    Err(e) => {
                        warn!(role = %DerivativeRole::Video, error = %e, "Derivative failed, dropping item");
                        None
                    }
                }
            }
        }
    }

    /// Thumbnail, timeline and fullscreen renditions, fetched together.
    async fn cache_photo_set(&self, item: &MediaItem) -> Option<PhotoCache> {
        let aspect_ratio = item.aspect_ratio();

        let (thumbnail, timeline, fullscreen) = futures::join!(
            self.cache_rendition(item, DerivativeRole::Thumbnail, aspect_ratio),
            self.cache_rendition(item, DerivativeRole::Timeline, aspect_ratio),
            self.cache_rendition(item, DerivativeRole::Fullscreen, aspect_ratio),
        );

        match (thumbnail, timeline, fullscreen) {
            (Ok(thumbnail), Ok(timeline), Ok(fullscreen)) => Some(PhotoCache {
                thumbnail,
                timeline,
                fullscreen,
            }),
            (thumbnail, timeline, fullscreen) => {
                let results = [
                    (DerivativeRole::Thumbnail, thumbnail.err()),
                    (DerivativeRole::Timeline, timeline.err()),
                    (DerivativeRole::Fullscreen, fullscreen.err()),
                ];
                for (role, err) in results {
                    if let Some(e) = err {
                        warn!(role = %role, error = %e, "Derivative failed, dropping item");
                    }
                }
                None
            }
        }
    }

    async fn cache_rendition(
        &self,
        item: &MediaItem,
        role: DerivativeRole,
        aspect_ratio: f64,
    ) -> Result<DerivativeRecord, DerivativeError> {
        let url = self.cache_file(item, role).await?;
        let (width, height) = role.dimensions(aspect_ratio).unwrap_or((item.width, item.height));
        Ok(DerivativeRecord::new(url, width, height))
    }

    /// Fetch, resolve the extension and write one derivative; returns its
    /// public URL.
    async fn cache_file(
        &self,
        item: &MediaItem,
        role: DerivativeRole,
    ) -> Result<String, DerivativeError> {
        let media = self.fetcher.fetch(&item.locator_for(role)).await?;

        let Some(extension) = media
            .content_type
            .as_deref()
            .and_then(extension_for_content_type)
        else {
            return Err(DerivativeError::UnknownContentType(media.content_type));
        };

        self.writer
            .write(role, &item.id, &media.bytes, extension)
            .await?;

        Ok(self.writer.public_url(role, &item.id, extension))
    }
}

/// Requested items that have a manifest entry, in request order.
fn join_manifest(items: &[MediaItem], manifest: &CacheManifest) -> Vec<CachedMediaItem> {
    items
        .iter()
        .filter_map(|item| {
            manifest.get(&item.id).map(|entry| CachedMediaItem {
                item: item.clone(),
                cache: entry.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, StoreError};
    use crate::fetcher::RetryPolicy;
    use crate::manifest::{MANIFEST_FILE, VERSION_FILE};
    use crate::transport::FetchedMedia;
    use async_trait::async_trait;
    use crate::media::VideoStatus;
    use crate::test_utils::{MockTransport, init_tracing};
    use reqwest::StatusCode;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    fn config(root: &Path) -> CacheConfig {
        CacheConfig::builder(root)
            .with_retry_policy(RetryPolicy {
                max_retries: 3,
                base_delay: Duration::ZERO,
            })
            .build()
    }

    fn setup(transport: MockTransport) -> (TempDir, Arc<MockTransport>, MediaCache) {
        init_tracing();
        let dir = tempdir().unwrap();
        let transport = Arc::new(transport);
        let cache = MediaCache::with_transport(config(&dir.path().join("media")), transport.clone());
        (dir, transport, cache)
    }

    fn photo(id: &str, width: u32, height: u32) -> MediaItem {
        MediaItem::photo(id, format!("https://lh3.example.com/{id}"), width, height)
    }

    fn video(id: &str, status: VideoStatus) -> MediaItem {
        MediaItem::video(id, format!("https://lh3.example.com/{id}"), 1920, 1080, status)
    }

    fn ids(run: &CacheRun) -> Vec<&str> {
        run.items.iter().map(|c| c.item.id.as_str()).collect()
    }

    fn photo_entry(run: &CacheRun, id: &str) -> PhotoCache {
        match run.items.iter().find(|c| c.item.id == id).map(|c| &c.cache) {
            Some(CacheEntry::Photo(photo)) => photo.clone(),
            other => panic!("expected photo entry for {id}, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rebuild_end_to_end() {
        let (dir, transport, cache) = setup(MockTransport::always("image/jpeg"));
        let items = vec![photo("A", 2000, 1000), photo("B", 500, 500)];

        let run = cache.cache_items(&items).await.unwrap();

        assert!(matches!(run.outcome, CacheOutcome::Rebuilt(ref s) if s.cached == 2 && s.dropped == 0));
        assert_eq!(ids(&run), ["A", "B"]);
        assert_eq!(transport.calls(), 6);

        let root = dir.path().join("media");
        let version = tokio::fs::read_to_string(root.join("version.txt")).await.unwrap();
        assert_eq!(version, fingerprint(["A", "B"]));
        assert_eq!(run.version, version);

        let a = photo_entry(&run, "A");
        assert_eq!(a.timeline.metadata.height, 540);
        assert_eq!(a.fullscreen.metadata.height, 1280);
        assert_eq!(a.thumbnail.metadata.height, 256);
        assert_eq!(a.timeline.url, "/media/timeline/A.jpg");

        let b = photo_entry(&run, "B");
        assert_eq!(b.timeline.metadata.height, 1080);
        assert_eq!(b.thumbnail.metadata.height, 256);

        for role in DerivativeRole::PHOTO_ROLES {
            let path = root.join(role.dir_name()).join("A.jpg");
            let locator = items[0].locator_for(role);
            assert_eq!(
                tokio::fs::read(&path).await.unwrap(),
                MockTransport::body_for(&locator).to_vec()
            );
        }

        let manifest = cache.store.read_manifest().await.found().unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.get("A"), Some(&CacheEntry::Photo(a)));
    }

    #[tokio::test]
    async fn test_unchanged_collection_is_a_hit_without_fetches() {
        let (_dir, transport, cache) = setup(MockTransport::always("image/jpeg"));
        let items = vec![photo("A", 2000, 1000), photo("B", 500, 500)];

        let first = cache.cache_items(&items).await.unwrap();
        let calls = transport.calls();

        let second = cache.cache_items(&items).await.unwrap();

        assert!(matches!(second.outcome, CacheOutcome::Hit));
        assert_eq!(transport.calls(), calls);
        assert_eq!(first.items, second.items);
        assert_eq!(first.version, second.version);
    }

    #[tokio::test]
    async fn test_reordered_collection_is_a_hit() {
        let (_dir, transport, cache) = setup(MockTransport::always("image/jpeg"));
        let items = vec![photo("A", 2000, 1000), photo("B", 500, 500)];
        cache.cache_items(&items).await.unwrap();
        let calls = transport.calls();

        let reordered = vec![items[1].clone(), items[0].clone()];
        let run = cache.cache_items(&reordered).await.unwrap();

        assert!(matches!(run.outcome, CacheOutcome::Hit));
        assert_eq!(transport.calls(), calls);
        assert_eq!(ids(&run), ["B", "A"]);
    }

    #[tokio::test]
    async fn test_membership_change_rebuilds() {
        let (dir, transport, cache) = setup(MockTransport::always("image/jpeg"));
        let root = dir.path().join("media");
        let first = cache
            .cache_items(&[photo("A", 2000, 1000), photo("B", 500, 500)])
            .await
            .unwrap();

        let grown = cache
            .cache_items(&[photo("A", 2000, 1000), photo("B", 500, 500), photo("C", 100, 300)])
            .await
            .unwrap();
        assert!(matches!(grown.outcome, CacheOutcome::Rebuilt(_)));
        assert_ne!(grown.version, first.version);
        assert_eq!(transport.calls(), 6 + 9);

        let shrunk = cache.cache_items(&[photo("B", 500, 500)]).await.unwrap();
        assert!(matches!(shrunk.outcome, CacheOutcome::Rebuilt(_)));
        assert_eq!(ids(&shrunk), ["B"]);
        // stale derivatives of removed items are gone
        assert!(!root.join("timeline").join("A.jpg").exists());
        assert!(root.join("timeline").join("B.jpg").exists());
    }

    #[tokio::test]
    async fn test_failed_derivative_drops_only_that_item() {
        let a = photo("A", 2000, 1000);
        let b = photo("B", 500, 500);
        let transport = MockTransport::always("image/jpeg").fail(
            &a.locator_for(DerivativeRole::Timeline),
            FetchError::Status(StatusCode::NOT_FOUND),
        );
        let (dir, transport, cache) = setup(transport);

        let run = cache.cache_items(&[a.clone(), b]).await.unwrap();

        assert_eq!(ids(&run), ["B"]);
        assert!(matches!(run.outcome, CacheOutcome::Rebuilt(ref s) if s.dropped == 1));
        // not retried, siblings still attempted
        assert_eq!(transport.calls_for(&a.locator_for(DerivativeRole::Timeline)), 1);
        assert_eq!(transport.calls_for(&a.locator_for(DerivativeRole::Thumbnail)), 1);
        assert_eq!(transport.calls_for(&a.locator_for(DerivativeRole::Fullscreen)), 1);

        let manifest = cache.store.read_manifest().await.found().unwrap();
        assert!(!manifest.contains_key("A"));
        assert!(manifest.contains_key("B"));
        assert!(!dir.path().join("media/timeline/A.jpg").exists());
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_within_item() {
        let a = photo("A", 2000, 1000);
        let locator = a.locator_for(DerivativeRole::Fullscreen);
        let transport = MockTransport::always("image/jpeg").script(
            &locator,
            vec![
                Err(FetchError::Status(StatusCode::SERVICE_UNAVAILABLE)),
                Err(FetchError::Network("connection reset".into())),
            ],
        );
        let (_dir, transport, cache) = setup(transport);

        let run = cache.cache_items(&[a]).await.unwrap();

        assert_eq!(ids(&run), ["A"]);
        assert_eq!(transport.calls_for(&locator), 3);
    }

    #[tokio::test]
    async fn test_unknown_content_type_drops_item() {
        let a = photo("A", 2000, 1000);
        let b = photo("B", 500, 500);
        let transport = MockTransport::always("image/png")
            .content_type_for(&a.locator_for(DerivativeRole::Thumbnail), Some("text/html"))
            .content_type_for(&b.locator_for(DerivativeRole::Timeline), None);
        let (dir, _transport, cache) = setup(transport);

        let run = cache.cache_items(&[a, b]).await.unwrap();

        assert!(run.items.is_empty());
        let root = dir.path().join("media");
        assert!(!root.join("thumbnail/A.html").exists());
        assert!(root.join("timeline/A.png").exists());
    }

    #[tokio::test]
    async fn test_video_not_ready_is_never_cached() {
        let v = video("V", VideoStatus::Processing);
        let (dir, transport, cache) = setup(MockTransport::always("image/jpeg"));

        let run = cache.cache_items(&[v.clone(), photo("P", 10, 10)]).await.unwrap();

        assert_eq!(ids(&run), ["P"]);
        // the poster set is still fetched, the stream never is
        assert_eq!(transport.calls_for(&v.locator_for(DerivativeRole::Thumbnail)), 1);
        assert!(!transport.requested_urls().contains(&v.video_locator()));
        let manifest = cache.store.read_manifest().await.found().unwrap();
        assert!(!manifest.contains_key("V"));
        assert!(!dir.path().join("media/video/V.mp4").exists());
    }

    #[tokio::test]
    async fn test_ready_video_is_cached_with_poster() {
        let v = video("V", VideoStatus::Ready);
        let transport = MockTransport::always("image/jpeg")
            .content_type_for(&v.video_locator(), Some("video/mp4"));
        let (dir, transport, cache) = setup(transport);

        let run = cache.cache_items(&[v.clone()]).await.unwrap();

        assert_eq!(transport.calls_for(&v.video_locator()), 1);
        match &run.items[0].cache {
            CacheEntry::Video(entry) => {
                assert_eq!(entry.video.url, "/media/video/V.mp4");
                assert_eq!(entry.poster_photo.timeline.metadata.height, 608);
                assert_eq!(entry.poster_photo.thumbnail.url, "/media/thumbnail/V.jpg");
            }
            other => panic!("expected video entry, got {other:?}"),
        }
        assert!(dir.path().join("media/video/V.mp4").exists());
    }

    #[tokio::test]
    async fn test_video_needs_complete_poster_set() {
        let v = video("V", VideoStatus::Ready);
        let transport = MockTransport::always("video/mp4").fail(
            &v.locator_for(DerivativeRole::Thumbnail),
            FetchError::Status(StatusCode::FORBIDDEN),
        );
        let (_dir, transport, cache) = setup(transport);

        let run = cache.cache_items(&[v.clone()]).await.unwrap();

        assert!(run.items.is_empty());
        assert_eq!(transport.calls_for(&v.video_locator()), 0);
    }

    #[tokio::test]
    async fn test_video_stream_failure_drops_item() {
        let v = video("V", VideoStatus::Ready);
        let transport = MockTransport::always("image/jpeg")
            .fail(&v.video_locator(), FetchError::Status(StatusCode::GONE));
        let (_dir, _transport, cache) = setup(transport);

        let run = cache.cache_items(&[v]).await.unwrap();
        assert!(run.items.is_empty());
    }

    #[tokio::test]
    async fn test_hit_drops_items_without_entry() {
        let a = photo("A", 2000, 1000);
        let transport = MockTransport::always("image/jpeg").fail(
            &a.locator_for(DerivativeRole::Timeline),
            FetchError::Status(StatusCode::NOT_FOUND),
        );
        let (_dir, transport, cache) = setup(transport);
        let items = vec![a, photo("B", 500, 500)];
        cache.cache_items(&items).await.unwrap();
        let calls = transport.calls();

        let run = cache.cache_items(&items).await.unwrap();

        assert!(matches!(run.outcome, CacheOutcome::Hit));
        assert_eq!(ids(&run), ["B"]);
        assert_eq!(transport.calls(), calls);
    }

    #[tokio::test]
    async fn test_corrupt_manifest_on_hit_rebuilds() {
        let (dir, transport, cache) = setup(MockTransport::always("image/jpeg"));
        let items = vec![photo("A", 2000, 1000)];
        cache.cache_items(&items).await.unwrap();
        tokio::fs::write(dir.path().join("media").join(MANIFEST_FILE), "{")
            .await
            .unwrap();

        let run = cache.cache_items(&items).await.unwrap();

        assert!(matches!(run.outcome, CacheOutcome::Rebuilt(_)));
        assert_eq!(ids(&run), ["A"]);
        assert_eq!(transport.calls(), 6);
    }

    #[tokio::test]
    async fn test_corrupt_manifest_on_hit_can_serve_nothing() {
        init_tracing();
        let dir = tempdir().unwrap();
        let transport = Arc::new(MockTransport::always("image/jpeg"));
        let config = CacheConfig::builder(dir.path().join("media"))
            .with_manifest_fallback(ManifestFallback::Empty)
            .build();
        let cache = MediaCache::with_transport(config, transport.clone());
        let items = vec![photo("A", 2000, 1000)];
        cache.cache_items(&items).await.unwrap();
        tokio::fs::remove_file(dir.path().join("media").join(MANIFEST_FILE))
            .await
            .unwrap();

        let run = cache.cache_items(&items).await.unwrap();

        assert!(matches!(run.outcome, CacheOutcome::Unavailable));
        assert!(run.items.is_empty());
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_reset_failure_is_fatal() {
        init_tracing();
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        tokio::fs::write(&blocker, b"file").await.unwrap();
        let transport = Arc::new(MockTransport::always("image/jpeg"));
        let cache = MediaCache::with_transport(config(&blocker.join("media")), transport.clone());

        let err = cache.cache_items(&[photo("A", 10, 10)]).await.unwrap_err();

        assert!(matches!(err, CacheError::Structural { .. }));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_parallel_items_keep_order_and_atomicity() {
        init_tracing();
        let items: Vec<MediaItem> = (0..8).map(|i| photo(&format!("I{i}"), 400, 300)).collect();
        let transport = Arc::new(MockTransport::always("image/webp").fail(
            &items[3].locator_for(DerivativeRole::Fullscreen),
            FetchError::Status(StatusCode::NOT_FOUND),
        ));
        let dir = tempdir().unwrap();
        let config = CacheConfig::builder(dir.path().join("media"))
            .with_item_concurrency(4)
            .build();
        let cache = MediaCache::with_transport(config, transport.clone());

        let run = cache.cache_items(&items).await.unwrap();

        assert_eq!(ids(&run), ["I0", "I1", "I2", "I4", "I5", "I6", "I7"]);
        assert_eq!(transport.calls(), 24);
        assert_eq!(photo_entry(&run, "I5").timeline.metadata.height, 810);
        assert_eq!(photo_entry(&run, "I5").timeline.url, "/media/timeline/I5.webp");
    }

    /// Occupies the temporary paths the store writes through once the rebuild
    /// has started fetching, so the matching persist fails.
    struct PersistBlocker {
        inner: MockTransport,
        blocked: Vec<PathBuf>,
    }

    #[async_trait]
    impl DerivativeTransport for PersistBlocker {
        async fn fetch(&self, url: &str) -> Result<FetchedMedia, FetchError> {
            for path in &self.blocked {
                tokio::fs::create_dir_all(path).await.unwrap();
            }
            self.inner.fetch(url).await
        }
    }

    fn blocking_cache(root: &Path, blocked: &[&str]) -> MediaCache {
        let transport = PersistBlocker {
            inner: MockTransport::always("image/jpeg"),
            blocked: blocked.iter().map(|name| root.join(name)).collect(),
        };
        MediaCache::with_transport(config(root), Arc::new(transport))
    }

    #[tokio::test]
    async fn test_version_write_failure_still_serves_items() {
        init_tracing();
        let dir = tempdir().unwrap();
        let root = dir.path().join("media");
        let cache = blocking_cache(&root, &["version.tmp"]);
        let items = vec![photo("A", 2000, 1000), photo("B", 500, 500)];

        let run = cache.cache_items(&items).await.unwrap();

        assert_eq!(ids(&run), ["A", "B"]);
        match &run.outcome {
            CacheOutcome::Rebuilt(stats) => {
                assert!(stats.manifest.is_stored());
                assert!(matches!(
                    stats.version,
                    Persisted::Degraded(StoreError::Io { .. })
                ));
            }
            other => panic!("expected rebuild, got {other:?}"),
        }
        assert!(!root.join(VERSION_FILE).exists());

        // no version marker, so the next run rebuilds again
        let next = cache.cache_items(&items).await.unwrap();
        assert!(matches!(next.outcome, CacheOutcome::Rebuilt(_)));
        assert_eq!(next.items, run.items);
    }

    #[tokio::test]
    async fn test_manifest_write_failure_rebuilds_next_run() {
        init_tracing();
        let dir = tempdir().unwrap();
        let root = dir.path().join("media");
        let cache = blocking_cache(&root, &["config.tmp"]);
        let items = vec![photo("A", 2000, 1000)];

        let run = cache.cache_items(&items).await.unwrap();

        assert_eq!(ids(&run), ["A"]);
        match &run.outcome {
            CacheOutcome::Rebuilt(stats) => {
                assert!(!stats.manifest.is_stored());
                assert!(stats.version.is_stored());
            }
            other => panic!("expected rebuild, got {other:?}"),
        }

        // version matches but the manifest is missing: default fallback rebuilds
        let next = cache.cache_items(&items).await.unwrap();
        assert!(matches!(next.outcome, CacheOutcome::Rebuilt(_)));
        assert_eq!(ids(&next), ["A"]);
    }

    #[tokio::test]
    async fn test_unreadable_version_is_a_miss() {
        let (dir, transport, cache) = setup(MockTransport::always("image/jpeg"));
        let root = dir.path().join("media");
        let items = vec![photo("A", 2000, 1000)];
        cache.cache_items(&items).await.unwrap();

        tokio::fs::remove_file(root.join(VERSION_FILE)).await.unwrap();
        tokio::fs::create_dir(root.join(VERSION_FILE)).await.unwrap();
        assert!(matches!(
            cache.store.read_version().await,
            StoreRead::Unreadable(_)
        ));

        let run = cache.cache_items(&items).await.unwrap();

        assert!(matches!(run.outcome, CacheOutcome::Rebuilt(_)));
        assert_eq!(ids(&run), ["A"]);
        assert_eq!(transport.calls(), 6);
        assert_eq!(
            cache.store.read_version().await.found(),
            Some(fingerprint(["A"]))
        );

        let hit = cache.cache_items(&items).await.unwrap();
        assert!(matches!(hit.outcome, CacheOutcome::Hit));
    }

    #[tokio::test]
    async fn test_empty_collection() {
        let (_dir, transport, cache) = setup(MockTransport::always("image/jpeg"));

        let first = cache.cache_items(&[]).await.unwrap();
        assert!(matches!(first.outcome, CacheOutcome::Rebuilt(_)));
        let second = cache.cache_items(&[]).await.unwrap();
        assert!(matches!(second.outcome, CacheOutcome::Hit));
        assert!(second.items.is_empty());
        assert_eq!(transport.calls(), 0);
    }
}
