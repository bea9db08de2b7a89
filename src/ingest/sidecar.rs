//! Detection sidecar source.
//!
//! A sidecar is `<media file name>.detections.json`, written by the detector
//! next to the media file:
//!
//! ```json
//! {
//!   "fps": 30.0,
//!   "frames": [
//!     { "frame_index": 0, "detections": [
//!       { "class_id": 2, "confidence": 0.91, "bbox": [12.0, 40.0, 220.0, 310.0] }
//!     ] }
//!   ]
//! }
//! ```
//!
//! `frame_index` and `timestamp` may be omitted; they default to the frame's
//! position and `position / fps`. Resolved video frame indices must be
//! strictly increasing. A detection may carry its own `class_name`,
//! otherwise the class table supplies it.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::{IngestError, MediaKind};
use crate::detect::{ClassTable, Detection, FrameRecord};

const SIDECAR_SUFFIX: &str = ".detections.json";

#[derive(Debug, Deserialize)]
struct SidecarFile {
    #[serde(default)]
    fps: Option<f64>,
    frames: Vec<SidecarFrame>,
}

#[derive(Debug, Deserialize)]
struct SidecarFrame {
    #[serde(default)]
    frame_index: Option<u64>,
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    detections: Vec<SidecarDetection>,
}

#[derive(Debug, Deserialize)]
struct SidecarDetection {
    class_id: u32,
    #[serde(default)]
    class_name: Option<String>,
    confidence: f32,
    #[serde(default)]
    bbox: [f32; 4],
}

/// Path of the sidecar belonging to `media`.
pub fn sidecar_path(media: &Path) -> PathBuf {
    let mut name = media.file_name().unwrap_or_default().to_os_string();
    name.push(SIDECAR_SUFFIX);
    media.with_file_name(name)
}

/// Configuration for reading one media file's sidecar.
#[derive(Clone, Debug)]
pub struct SidecarConfig {
    /// The media file (not the sidecar).
    pub media_path: PathBuf,
    pub kind: MediaKind,
    /// Detections below this confidence are dropped.
    pub confidence_floor: f32,
}

/// Counters from the last `read_frames` call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub frames_read: u64,
    pub detections_kept: u64,
    pub detections_dropped: u64,
}

/// Reads detector sidecars into frame records.
pub struct SidecarSource<'a> {
    config: SidecarConfig,
    classes: &'a ClassTable,
    stats: IngestStats,
}

impl<'a> SidecarSource<'a> {
    pub fn new(config: SidecarConfig, classes: &'a ClassTable) -> Self {
        Self {
            config,
            classes,
            stats: IngestStats::default(),
        }
    }

    /// Read and filter the sidecar.
    ///
    /// Images yield exactly one record (index 0); videos yield every frame in
    /// file order. A missing, unreadable or frameless sidecar is an error.
    pub fn read_frames(&mut self) -> Result<Vec<FrameRecord>, IngestError> {
        let media = self.config.media_path.clone();
        let path = sidecar_path(&media);
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            IngestError::failed(&media, format!("cannot read {}: {}", path.display(), e))
        })?;
        let file: SidecarFile = serde_json::from_str(&raw).map_err(|e| {
            IngestError::failed(&media, format!("invalid sidecar {}: {}", path.display(), e))
        })?;
        if file.frames.is_empty() {
            return Err(IngestError::failed(&media, "sidecar contains no frames"));
        }

        self.stats = IngestStats::default();
        let fps = file.fps.filter(|fps| *fps > 0.0);
        let frames: Vec<FrameRecord> = match self.config.kind {
            MediaKind::Video => file
                .frames
                .into_iter()
                .enumerate()
                .map(|(position, frame)| self.convert(position as u64, fps, frame))
                .collect(),
            MediaKind::Image => {
                if file.frames.len() > 1 {
                    log::warn!(
                        "{}: image sidecar has {} frames, using the first",
                        media.display(),
                        file.frames.len()
                    );
                }
                let first = file.frames.into_iter().next();
                first
                    .map(|frame| {
                        let record = self.convert(0, None, frame);
                        FrameRecord::still(record.detections)
                    })
                    .into_iter()
                    .collect()
            }
        };

        if let Some(pair) = frames
            .windows(2)
            .find(|pair| pair[0].frame_index >= pair[1].frame_index)
        {
            return Err(IngestError::failed(
                &media,
                format!(
                    "frame indices must be strictly increasing (frame {} follows {})",
                    pair[1].frame_index, pair[0].frame_index
                ),
            ));
        }

        log::debug!(
            "{}: {} frames, {} detections kept, {} below {:.2}",
            media.display(),
            self.stats.frames_read,
            self.stats.detections_kept,
            self.stats.detections_dropped,
            self.config.confidence_floor
        );
        Ok(frames)
    }

    fn convert(&mut self, position: u64, fps: Option<f64>, frame: SidecarFrame) -> FrameRecord {
        self.stats.frames_read += 1;
        let frame_index = frame.frame_index.unwrap_or(position);
        let timestamp = frame
            .timestamp
            .or_else(|| fps.map(|fps| frame_index as f64 / fps))
            .unwrap_or(0.0);

        let floor = self.config.confidence_floor;
        let mut detections = Vec::with_capacity(frame.detections.len());
        for det in frame.detections {
            if !det.confidence.is_finite() || det.confidence < floor {
                self.stats.detections_dropped += 1;
                continue;
            }
            self.stats.detections_kept += 1;
            let class_name = det
                .class_name
                .unwrap_or_else(|| self.classes.name_of(det.class_id));
            detections.push(
                Detection::new(det.class_id, class_name, det.confidence).with_bbox(det.bbox),
            );
        }
        FrameRecord::new(frame_index, timestamp, detections)
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }
}
