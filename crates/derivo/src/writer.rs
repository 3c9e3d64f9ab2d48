//! # Derivative Writer
//!
//! Persists fetched derivatives below the cache root, one subdirectory per
//! role, and resolves the public URL each file is served under.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tracing::{debug, warn};

use crate::role::DerivativeRole;

/// File extension for a transport content type.
///
/// Only the MIME essence is considered (parameters are stripped, case is
/// ignored). Returns `None` for types with no known image or video extension.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let ext = match essence.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/heic" => "heic",
        "image/heif" => "heif",
        "image/bmp" => "bmp",
        "image/tiff" => "tif",
        "image/svg+xml" => "svg",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        "video/3gpp" => "3gp",
        "video/x-msvideo" => "avi",
        "video/x-matroska" => "mkv",
        "video/mpeg" => "mpeg",
        "video/x-m4v" => "m4v",
        _ => return None,
    };
    Some(ext)
}

/// Item ids become file names; reject anything that could leave the role
/// directory.
fn is_safe_item_id(item_id: &str) -> bool {
    !item_id.is_empty()
        && item_id != "."
        && item_id != ".."
        && !item_id.contains(['/', '\\', '\0'])
}

/// Writes derivative files below a cache root.
#[derive(Debug, Clone)]
pub struct DerivativeWriter {
    root: PathBuf,
    public_prefix: String,
}

impl DerivativeWriter {
    pub fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<role>/<item_id>.<ext>`
    pub fn path_for(&self, role: DerivativeRole, item_id: &str, extension: &str) -> PathBuf {
        self.root
            .join(role.dir_name())
            .join(format!("{item_id}.{extension}"))
    }

    /// `<prefix>/<role>/<item_id>.<ext>`, the URL recorded in the manifest.
    pub fn public_url(&self, role: DerivativeRole, item_id: &str, extension: &str) -> String {
        format!(
            "{}/{}/{item_id}.{extension}",
            self.public_prefix,
            role.dir_name()
        )
    }

    /// Write the whole buffer for one derivative.
    ///
    /// Data goes to a temporary sibling first and is renamed into place, so a
    /// reader never sees a truncated file.
    pub async fn write(
        &self,
        role: DerivativeRole,
        item_id: &str,
        bytes: &Bytes,
        extension: &str,
    ) -> std::io::Result<PathBuf> {
        if !is_safe_item_id(item_id) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("item id {item_id:?} cannot be used as a file name"),
            ));
        }

        let path = self.path_for(role, item_id, extension);
        let temp_path = path.with_extension(format!("{extension}.tmp"));

        if let Err(e) = fs::write(&temp_path, bytes).await {
            warn!(path = ?temp_path, error = %e, "Failed to write derivative file");
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, &path).await {
            warn!(
                from = ?temp_path,
                to = ?path,
                error = %e,
                "Failed to rename temporary derivative file"
            );
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        debug!(path = ?path, size = bytes.len(), role = %role, "Wrote derivative");
        Ok(path)
    }
}
