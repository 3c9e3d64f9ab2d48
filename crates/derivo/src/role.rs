use std::fmt;

use serde::{Deserialize, Serialize};

/// Display role a derivative is produced for.
///
/// Every role owns one subdirectory of the cache root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivativeRole {
    /// Square-cropped grid thumbnail
    Thumbnail,
    /// Inline rendition shown while scrolling the timeline
    Timeline,
    /// Large rendition for the fullscreen viewer
    Fullscreen,
    /// Raw video stream, never resized
    Video,
}

impl DerivativeRole {
    /// Roles fetched for every photo, and for every video's poster frame.
    pub const PHOTO_ROLES: [DerivativeRole; 3] = [
        DerivativeRole::Thumbnail,
        DerivativeRole::Timeline,
        DerivativeRole::Fullscreen,
    ];

    /// All roles, in the order their directories are created.
    pub const ALL: [DerivativeRole; 4] = [
        DerivativeRole::Thumbnail,
        DerivativeRole::Timeline,
        DerivativeRole::Fullscreen,
        DerivativeRole::Video,
    ];

    /// Target width in pixels, `None` for the raw video stream.
    pub const fn target_width(self) -> Option<u32> {
        match self {
            DerivativeRole::Thumbnail => Some(256),
            DerivativeRole::Timeline => Some(1080),
            DerivativeRole::Fullscreen => Some(2560),
            DerivativeRole::Video => None,
        }
    }

    /// Whether the remote service should crop to a 1:1 square.
    pub const fn is_square_crop(self) -> bool {
        matches!(self, DerivativeRole::Thumbnail)
    }

    /// Name of the role's subdirectory below the cache root.
    pub const fn dir_name(self) -> &'static str {
        match self {
            DerivativeRole::Thumbnail => "thumbnail",
            DerivativeRole::Timeline => "timeline",
            DerivativeRole::Fullscreen => "fullscreen",
            DerivativeRole::Video => "video",
        }
    }

    /// Output dimensions for a source with the given aspect ratio
    /// (height / width). The thumbnail ignores it and stays square.
    pub fn dimensions(self, aspect_ratio: f64) -> Option<(u32, u32)> {
        let width = self.target_width()?;
        let ratio = if self.is_square_crop() { 1.0 } else { aspect_ratio };
        let height = (f64::from(width) * ratio).round() as u32;
        Some((width, height))
    }
}

impl fmt::Display for DerivativeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}
