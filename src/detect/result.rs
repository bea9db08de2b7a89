use serde::{Deserialize, Serialize};

/// A single labelled box reported by the detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub class_name: String,
    /// Detector confidence (0.0..=1.0).
    pub confidence: f32,
    /// Bounding box as `[x1, y1, x2, y2]` in source pixels.
    pub bbox: [f32; 4],
}

impl Detection {
    pub fn new(class_id: u32, class_name: impl Into<String>, confidence: f32) -> Self {
        Self {
            class_id,
            class_name: class_name.into(),
            confidence,
            bbox: [0.0; 4],
        }
    }

    pub fn with_bbox(mut self, bbox: [f32; 4]) -> Self {
        self.bbox = bbox;
        self
    }
}

/// Detections for one sampled frame, in temporal order within a clip.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_index: u64,
    /// Seconds from the start of the clip.
    pub timestamp: f64,
    pub detections: Vec<Detection>,
}

impl FrameRecord {
    pub fn new(frame_index: u64, timestamp: f64, detections: Vec<Detection>) -> Self {
        Self {
            frame_index,
            timestamp,
            detections,
        }
    }

    /// Single record used for still images.
    pub fn still(detections: Vec<Detection>) -> Self {
        Self::new(0, 0.0, detections)
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}
