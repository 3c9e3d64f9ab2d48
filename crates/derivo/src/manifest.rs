//! # Manifest Store
//!
//! Persists the cache manifest (`config.json`) and the version marker
//! (`version.txt`) at the top of the cache root, and owns the layout of the
//! root itself.
//!
//! Reads and writes never fail the caller. They report a degraded outcome
//! instead, which at worst causes an unnecessary rebuild on the next run.
//! Only [`ManifestStore::reset_cache_root`] is fatal.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{CacheError, StoreError};
use crate::role::DerivativeRole;

pub const VERSION_FILE: &str = "version.txt";
pub const MANIFEST_FILE: &str = "config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivativeMetadata {
    pub width: u32,
    pub height: u32,
}

/// One successfully cached rendition. The role is the key it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivativeRecord {
    pub url: String,
    pub metadata: DerivativeMetadata,
}

impl DerivativeRecord {
    pub fn new(url: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            url: url.into(),
            metadata: DerivativeMetadata { width, height },
        }
    }
}

/// The three renditions of a photo, or of a video's poster frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoCache {
    pub thumbnail: DerivativeRecord,
    pub timeline: DerivativeRecord,
    pub fullscreen: DerivativeRecord,
}

impl PhotoCache {
    pub fn get(&self, role: DerivativeRole) -> Option<&DerivativeRecord> {
        match role {
            DerivativeRole::Thumbnail => Some(&self.thumbnail),
            DerivativeRole::Timeline => Some(&self.timeline),
            DerivativeRole::Fullscreen => Some(&self.fullscreen),
            DerivativeRole::Video => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoCache {
    pub video: VideoRecord,
    pub poster_photo: PhotoCache,
}

/// Cache entry of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheEntry {
    Video(VideoCache),
    Photo(PhotoCache),
}

/// Item id to cache entry.
pub type CacheManifest = BTreeMap<String, CacheEntry>;

/// Outcome of a best-effort read.
#[derive(Debug)]
pub enum StoreRead<T> {
    Found(T),
    /// Nothing persisted yet
    Missing,
    /// Present but could not be read or parsed
    Unreadable(StoreError),
}

impl<T> StoreRead<T> {
    pub fn found(self) -> Option<T> {
        match self {
            StoreRead::Found(value) => Some(value),
            StoreRead::Missing | StoreRead::Unreadable(_) => None,
        }
    }
}

/// Outcome of a best-effort write.
#[derive(Debug)]
#[must_use]
pub enum Persisted {
    Stored,
    Degraded(StoreError),
}

impl Persisted {
    pub fn is_stored(&self) -> bool {
        matches!(self, Persisted::Stored)
    }
}

#[derive(Debug, Clone)]
pub struct ManifestStore {
    root: PathBuf,
}

impl ManifestStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version_path(&self) -> PathBuf {
        self.root.join(VERSION_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Read the fingerprint of the currently cached collection.
    pub async fn read_version(&self) -> StoreRead<String> {
        let path = self.version_path();
        match read_optional(&path).await {
            StoreRead::Found(bytes) => {
                let version = String::from_utf8_lossy(&bytes).trim().to_string();
                if version.is_empty() {
                    debug!(path = ?path, "Version marker is empty");
                    StoreRead::Missing
                } else {
                    StoreRead::Found(version)
                }
            }
            StoreRead::Missing => StoreRead::Missing,
            StoreRead::Unreadable(e) => StoreRead::Unreadable(e),
        }
    }

    pub async fn write_version(&self, version: &str) -> Persisted {
        write_best_effort(&self.version_path(), version.as_bytes()).await
    }

    pub async fn read_manifest(&self) -> StoreRead<CacheManifest> {
        let path = self.manifest_path();
        match read_optional(&path).await {
            StoreRead::Found(bytes) => match serde_json::from_slice(&bytes) {
                Ok(manifest) => StoreRead::Found(manifest),
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to parse cache manifest");
                    StoreRead::Unreadable(StoreError::Json { path, source: e })
                }
            },
            StoreRead::Missing => StoreRead::Missing,
            StoreRead::Unreadable(e) => StoreRead::Unreadable(e),
        }
    }

    pub async fn write_manifest(&self, manifest: &CacheManifest) -> Persisted {
        let path = self.manifest_path();
        let json = match serde_json::to_vec(manifest) {
            Ok(json) => json,
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to serialize cache manifest");
                return Persisted::Degraded(StoreError::Json { path, source: e });
            }
        };

        write_best_effort(&path, &json).await
    }

    /// Remove the cache root and recreate it with empty role directories.
    pub async fn reset_cache_root(&self) -> Result<(), CacheError> {
        let structural = |path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| CacheError::Structural { path, source }
        };

        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(structural(&self.root)(e)),
        }

        fs::create_dir_all(&self.root)
            .await
            .map_err(structural(&self.root))?;

        for role in DerivativeRole::ALL {
            let dir = self.root.join(role.dir_name());
            fs::create_dir(&dir).await.map_err(structural(&dir))?;
        }

        debug!(root = ?self.root, "Reset cache root");
        Ok(())
    }
}

async fn read_optional(path: &Path) -> StoreRead<Vec<u8>> {
    match fs::read(path).await {
        Ok(bytes) => StoreRead::Found(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = ?path, "Cache file not present");
            StoreRead::Missing
        }
        Err(e) => {
            warn!(path = ?path, error = %e, "Failed to read cache file");
            StoreRead::Unreadable(StoreError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    }
}

/// Write through a temporary sibling and rename it into place.
async fn write_best_effort(path: &Path, data: &[u8]) -> Persisted {
    let temp_path = path.with_extension("tmp");

    let result = match fs::write(&temp_path, data).await {
        Ok(()) => fs::rename(&temp_path, path).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            debug!(path = ?path, size = data.len(), "Persisted cache file");
            Persisted::Stored
        }
        Err(e) => {
            warn!(path = ?path, error = %e, "Failed to persist cache file");
            let _ = fs::remove_file(&temp_path).await;
            Persisted::Degraded(StoreError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    }
}
