//! Frame ingestion.
//!
//! The detector runs out of process and leaves a JSON sidecar next to each
//! media file. This module finds media files, reads their sidecars and turns
//! them into ordered `FrameRecord`s for the classifier.
//!
//! The ingestion layer is responsible for:
//! - Applying the per-media-kind confidence cutoff
//! - Resolving class ids to species names
//! - Reporting unreadable input as `IngestError`, never as an empty clip
//!
//! The ingestion layer MUST NOT decide classifications.

pub mod sidecar;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use sidecar::{sidecar_path, IngestStats, SidecarConfig, SidecarSource};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif"];

/// Failure to produce frames for a media file. The file is skipped.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("ingestion failed for {}: {reason}", .path.display())]
    IngestionFailed { path: PathBuf, reason: String },
    #[error("unsupported media type: {}", .path.display())]
    UnsupportedMedia { path: PathBuf },
}

impl IngestError {
    pub(crate) fn failed(path: &Path, reason: impl Into<String>) -> Self {
        IngestError::IngestionFailed {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            IngestError::IngestionFailed { path, .. } => path,
            IngestError::UnsupportedMedia { path } => path,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    /// Media kind from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }
}

/// A media file found in an input folder.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MediaFile {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl MediaFile {
    /// Media file at `path`, or `UnsupportedMedia` when the extension is not
    /// a known video or image type.
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let kind = MediaKind::from_path(path).ok_or_else(|| IngestError::UnsupportedMedia {
            path: path.to_path_buf(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            kind,
        })
    }
}

/// List media files directly inside `dir`, sorted by path.
pub fn discover_media(dir: &Path) -> std::io::Result<Vec<MediaFile>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if let Some(kind) = MediaKind::from_path(&path) {
            files.push(MediaFile { path, kind });
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}
