//! # Media Model
//!
//! Typed media items as handed over by the upstream lister. The lister's wire
//! shape tells photos and videos apart only by which metadata sub-object is
//! present; that is resolved once here into [`MediaKind`]. Items are written
//! back out in the same wire shape, so downstream consumers see the lister's
//! record plus a `cache` attribute.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::IngestError;
use crate::manifest::CacheEntry;
use crate::role::DerivativeRole;

/// Readiness of a video on the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoStatus {
    Processing,
    Ready,
    Failed,
    /// `STATUS_UNSPECIFIED` and anything this model does not know yet
    #[default]
    #[serde(rename = "STATUS_UNSPECIFIED", other)]
    Unspecified,
}

impl VideoStatus {
    fn is_unspecified(&self) -> bool {
        *self == VideoStatus::Unspecified
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aperture_f_number: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_equivalent: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(default, skip_serializing_if = "VideoStatus::is_unspecified")]
    pub status: VideoStatus,
}

/// Kind-specific part of a media item.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaKind {
    Photo(PhotoMetadata),
    Video(VideoMetadata),
}

/// A media item as received from the lister.
///
/// Serializes in the lister's wire shape (see [`RawMediaItem`]).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "RawMediaItem")]
pub struct MediaItem {
    pub id: String,
    /// Locator of the remote image-transform service for this item.
    pub base_url: String,
    pub mime_type: Option<String>,
    pub filename: Option<String>,
    pub product_url: Option<String>,
    pub description: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub width: u32,
    pub height: u32,
    pub kind: MediaKind,
}

impl MediaItem {
    /// Build a photo item, mostly useful for callers that do not ingest the
    /// lister's JSON.
    pub fn photo(id: impl Into<String>, base_url: impl Into<String>, width: u32, height: u32) -> Self {
        Self::with_kind(id, base_url, width, height, MediaKind::Photo(PhotoMetadata::default()))
    }

    /// Build a video item with the given readiness.
    pub fn video(
        id: impl Into<String>,
        base_url: impl Into<String>,
        width: u32,
        height: u32,
        status: VideoStatus,
    ) -> Self {
        let metadata = VideoMetadata {
            status,
            ..VideoMetadata::default()
        };
        Self::with_kind(id, base_url, width, height, MediaKind::Video(metadata))
    }

    fn with_kind(
        id: impl Into<String>,
        base_url: impl Into<String>,
        width: u32,
        height: u32,
        kind: MediaKind,
    ) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            mime_type: None,
            filename: None,
            product_url: None,
            description: None,
            creation_time: None,
            width,
            height,
            kind,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self.kind, MediaKind::Video(_))
    }

    /// Only videos the remote service reports as `READY` can be streamed.
    pub fn is_video_ready(&self) -> bool {
        matches!(&self.kind, MediaKind::Video(meta) if meta.status == VideoStatus::Ready)
    }

    /// Source height divided by source width.
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.height) / f64::from(self.width)
    }

    /// Parameterized locator for a resized rendition.
    ///
    /// The `no` flag is always appended; it strips the play-button overlay
    /// from video poster frames and is harmless for photos.
    pub fn photo_locator(&self, width: Option<u32>, height: Option<u32>, crop: bool) -> String {
        let mut params = Vec::with_capacity(4);
        if let Some(width) = width {
            params.push(format!("w{width}"));
        }
        if let Some(height) = height {
            params.push(format!("h{height}"));
        }
        if crop {
            params.push("c".to_string());
        }
        params.push("no".to_string());

        format!("{}={}", self.base_url, params.join("-"))
    }

    /// Locator of the raw video stream.
    pub fn video_locator(&self) -> String {
        format!("{}=dv", self.base_url)
    }

    /// Locator for the given role. Only the thumbnail constrains the height;
    /// the other renditions keep the source's aspect ratio.
    pub fn locator_for(&self, role: DerivativeRole) -> String {
        match role {
            DerivativeRole::Video => self.video_locator(),
            role if role.is_square_crop() => {
                let side = role.target_width();
                self.photo_locator(side, side, true)
            }
            role => self.photo_locator(role.target_width(), None, false),
        }
    }
}

/// A media item joined with its cache entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedMediaItem {
    #[serde(flatten)]
    pub item: MediaItem,
    pub cache: CacheEntry,
}

/// Width/height as the lister sends them: decimal strings or plain numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    Number(u64),
    Text(String),
}

impl Dimension {
    fn parse(&self) -> Option<u32> {
        match self {
            Dimension::Number(n) => u32::try_from(*n).ok(),
            Dimension::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMediaMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<PhotoMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoMetadata>,
}

/// Wire shape of one lister record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMediaItem {
    pub id: String,
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub media_metadata: RawMediaMetadata,
}

/// Dimensions go back out as decimal strings, as the lister sends them.
impl From<MediaItem> for RawMediaItem {
    fn from(item: MediaItem) -> Self {
        let (photo, video) = match item.kind {
            MediaKind::Photo(photo) => (Some(photo), None),
            MediaKind::Video(video) => (None, Some(video)),
        };

        RawMediaItem {
            id: item.id,
            base_url: item.base_url,
            mime_type: item.mime_type,
            filename: item.filename,
            product_url: item.product_url,
            description: item.description,
            media_metadata: RawMediaMetadata {
                creation_time: item.creation_time,
                width: Some(Dimension::Text(item.width.to_string())),
                height: Some(Dimension::Text(item.height.to_string())),
                photo,
                video,
            },
        }
    }
}

impl TryFrom<RawMediaItem> for MediaItem {
    type Error = IngestError;

    fn try_from(raw: RawMediaItem) -> Result<Self, Self::Error> {
        let meta = raw.media_metadata;

        let dimension = |value: Option<&Dimension>, name: &str| {
            value
                .and_then(Dimension::parse)
                .filter(|v| *v > 0)
                .ok_or_else(|| IngestError::invalid(&raw.id, format!("missing or invalid {name}")))
        };
        let width = dimension(meta.width.as_ref(), "width")?;
        let height = dimension(meta.height.as_ref(), "height")?;

        let kind = match (meta.photo, meta.video) {
            (Some(photo), None) => MediaKind::Photo(photo),
            (None, Some(video)) => MediaKind::Video(video),
            (Some(_), Some(_)) => {
                return Err(IngestError::invalid(raw.id, "both photo and video metadata"));
            }
            (None, None) => {
                return Err(IngestError::invalid(raw.id, "neither photo nor video metadata"));
            }
        };

        if raw.base_url.is_empty() {
            return Err(IngestError::invalid(raw.id, "empty baseUrl"));
        }

        Ok(MediaItem {
            id: raw.id,
            base_url: raw.base_url,
            mime_type: raw.mime_type,
            filename: raw.filename,
            product_url: raw.product_url,
            description: raw.description,
            creation_time: meta.creation_time,
            width,
            height,
            kind,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMediaItemList {
    Bare(Vec<serde_json::Value>),
    Wrapped {
        #[serde(rename = "mediaItems", default)]
        media_items: Vec<serde_json::Value>,
    },
}

/// Items of a lister dump, plus the records that could not be ingested.
#[derive(Debug, Default)]
pub struct MediaListing {
    pub items: Vec<MediaItem>,
    pub rejected: Vec<IngestError>,
}

/// Parse a lister dump, either a bare array or `{"mediaItems": [...]}`.
///
/// A record the model cannot represent is skipped and reported in
/// [`MediaListing::rejected`]; only a dump that is not a list at all fails.
pub fn parse_media_items(json: &str) -> Result<MediaListing, IngestError> {
    let records = match serde_json::from_str::<RawMediaItemList>(json)? {
        RawMediaItemList::Bare(records) => records,
        RawMediaItemList::Wrapped { media_items } => media_items,
    };

    let mut listing = MediaListing::default();
    for (index, record) in records.into_iter().enumerate() {
        match ingest_record(index, record) {
            Ok(item) => listing.items.push(item),
            Err(e) => {
                warn!(error = %e, "Skipping media item");
                listing.rejected.push(e);
            }
        }
    }

    Ok(listing)
}

fn ingest_record(index: usize, record: serde_json::Value) -> Result<MediaItem, IngestError> {
    let id = record
        .get("id")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| format!("#{index}"));

    let raw: RawMediaItem =
        serde_json::from_value(record).map_err(|e| IngestError::invalid(id, e.to_string()))?;
    MediaItem::try_from(raw)
}
