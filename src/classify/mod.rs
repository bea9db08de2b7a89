//! Clip classification engine.
//!
//! Turns the detector's per-frame output for one media file into a single
//! label plus the statistics that justify it. Videos go through temporal
//! clustering and dominance checks; single frames (still images) use a
//! confidence-band procedure instead.
//!
//! Everything here is a pure function of its inputs: no I/O, no shared
//! state, no errors. Thresholds, the class table and predator/prey roles are
//! passed in explicitly and only borrowed.

mod image;
mod tally;
mod video;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::detect::{ClassTable, FrameRecord};
use crate::taxonomy::{SpeciesRoles, NO_ANIMAL_LABEL, UNSORTED_LABEL};

pub use image::analyze_image;
pub use video::analyze_video;

// -------------------- Thresholds --------------------

pub const DEFAULT_DOMINANT_SPECIES_THRESHOLD: f64 = 0.90;
pub const DEFAULT_MAX_SPECIES_TRANSITIONS: u32 = 5;
pub const DEFAULT_CONSECUTIVE_EMPTY_FRAMES: u32 = 15;
pub const DEFAULT_SIGNIFICANT_FRAME_FRACTION: f64 = 0.10;

pub const DEFAULT_IMAGE_MIN_DETECTIONS: usize = 1;
pub const DEFAULT_IMAGE_UNSORTED_MIN_CONFIDENCE: f32 = 0.35;
pub const DEFAULT_IMAGE_UNSORTED_MAX_CONFIDENCE: f32 = 0.65;
pub const DEFAULT_IMAGE_MULTI_SPECIES_GAP: f32 = 0.60;

/// Decision thresholds for multi-frame clips.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoThresholds {
    /// Share of all detections the leading species needs to win the clip.
    pub dominant_species_threshold: f64,
    /// Transition count above which a multi-species clip is unsorted.
    pub max_species_transitions: u32,
    /// Empty-frame run length that closes an open cluster.
    pub consecutive_empty_frames: u32,
    /// Frame coverage at which a species counts as significant.
    pub significant_frame_fraction: f64,
}

impl Default for VideoThresholds {
    fn default() -> Self {
        Self {
            dominant_species_threshold: DEFAULT_DOMINANT_SPECIES_THRESHOLD,
            max_species_transitions: DEFAULT_MAX_SPECIES_TRANSITIONS,
            consecutive_empty_frames: DEFAULT_CONSECUTIVE_EMPTY_FRAMES,
            significant_frame_fraction: DEFAULT_SIGNIFICANT_FRAME_FRACTION,
        }
    }
}

/// Decision thresholds for still images.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageThresholds {
    pub min_detections: usize,
    /// Lower bound (inclusive) of the ambiguous-confidence band.
    pub unsorted_min_confidence: f32,
    /// Upper bound (inclusive) of the ambiguous-confidence band.
    pub unsorted_max_confidence: f32,
    /// Average-confidence lead the top species needs over the runner-up.
    pub multi_species_gap: f32,
}

impl Default for ImageThresholds {
    fn default() -> Self {
        Self {
            min_detections: DEFAULT_IMAGE_MIN_DETECTIONS,
            unsorted_min_confidence: DEFAULT_IMAGE_UNSORTED_MIN_CONFIDENCE,
            unsorted_max_confidence: DEFAULT_IMAGE_UNSORTED_MAX_CONFIDENCE,
            multi_species_gap: DEFAULT_IMAGE_MULTI_SPECIES_GAP,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub video: VideoThresholds,
    pub image: ImageThresholds,
}

// -------------------- Results --------------------

/// Final label for a media file.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Classification {
    Species(String),
    /// Ambiguous evidence; needs a human.
    Unsorted,
    /// No qualifying detections.
    NoAnimal,
}

impl Classification {
    pub fn label(&self) -> &str {
        match self {
            Classification::Species(name) => name,
            Classification::Unsorted => UNSORTED_LABEL,
            Classification::NoAnimal => NO_ANIMAL_LABEL,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<Classification> for String {
    fn from(value: Classification) -> Self {
        value.label().to_string()
    }
}

impl From<String> for Classification {
    fn from(value: String) -> Self {
        match value.as_str() {
            UNSORTED_LABEL => Classification::Unsorted,
            NO_ANIMAL_LABEL => Classification::NoAnimal,
            _ => Classification::Species(value),
        }
    }
}

/// A run of frames sharing the same frame-local dominant species.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub species: String,
    pub start_frame: u64,
    pub end_frame: u64,
    pub frame_count: usize,
}

/// Outcome of analysing one media file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub classification: Classification,
    pub reason: String,
    pub total_frames: usize,
    pub frames_with_detections: usize,
    pub detection_rate: f64,
    /// Detection instances per observed species.
    pub species_counts: BTreeMap<String, usize>,
    /// Share of all detection instances, per species.
    pub species_percentages: BTreeMap<String, f64>,
    /// Share of frames in which the species appears.
    pub species_frame_percentages: BTreeMap<String, f64>,
    pub species_transitions: u32,
    /// Largest first; always empty for still images.
    pub clusters: Vec<Cluster>,
}

impl ClassificationResult {
    /// Species percentages ordered by share, largest first (ties by name).
    pub fn ranked_species(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .species_percentages
            .iter()
            .map(|(species, share)| (species.as_str(), *share))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

// -------------------- Dispatch --------------------

/// Classify one media file from its frame records.
///
/// A single record is treated as a still image; anything else takes the
/// video path. Callers never pass an empty sequence (ingestion rejects
/// those), but the video path still answers `No_Animal` for it.
pub fn analyze(
    frames: &[FrameRecord],
    classes: &ClassTable,
    roles: &SpeciesRoles,
    thresholds: &Thresholds,
) -> ClassificationResult {
    match frames {
        [still] => analyze_image(still, roles, &thresholds.image),
        _ => analyze_video(frames, classes, roles, &thresholds.video),
    }
}

/// Owned bundle of everything the engine reads, for callers that classify
/// many files with one configuration.
#[derive(Clone, Debug, Default)]
pub struct Classifier {
    classes: ClassTable,
    roles: SpeciesRoles,
    thresholds: Thresholds,
}

impl Classifier {
    pub fn new(classes: ClassTable, roles: SpeciesRoles, thresholds: Thresholds) -> Self {
        Self {
            classes,
            roles,
            thresholds,
        }
    }

    pub fn classify(&self, frames: &[FrameRecord]) -> ClassificationResult {
        analyze(frames, &self.classes, &self.roles, &self.thresholds)
    }
}

pub(crate) fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;

    fn det(name: &str, confidence: f32) -> Detection {
        Detection::new(0, name, confidence)
    }

    #[test]
    fn single_frame_takes_the_image_path() {
        // 0.50 sits inside the image band; the video path would call this Fox.
        let frames = vec![FrameRecord::still(vec![det("Fox", 0.50)])];
        let result = analyze(
            &frames,
            &ClassTable::new(),
            &SpeciesRoles::builtin(),
            &Thresholds::default(),
        );
        assert_eq!(result.classification, Classification::Unsorted);
        assert!(result.clusters.is_empty());
    }

    #[test]
    fn two_frames_take_the_video_path() {
        let frames = vec![
            FrameRecord::new(0, 0.0, vec![det("Fox", 0.50)]),
            FrameRecord::new(1, 0.1, vec![det("Fox", 0.50)]),
        ];
        let result = analyze(
            &frames,
            &ClassTable::new(),
            &SpeciesRoles::builtin(),
            &Thresholds::default(),
        );
        assert_eq!(result.classification, Classification::Species("Fox".into()));
        assert_eq!(result.clusters.len(), 1);
    }

    #[test]
    fn empty_sequence_does_not_panic() {
        let result = analyze(
            &[],
            &ClassTable::new(),
            &SpeciesRoles::builtin(),
            &Thresholds::default(),
        );
        assert_eq!(result.classification, Classification::NoAnimal);
        assert_eq!(result.detection_rate, 0.0);
    }

    #[test]
    fn classification_serializes_as_folder_label() -> serde_json::Result<()> {
        let labels = vec![
            Classification::Species("Wolf".into()),
            Classification::Unsorted,
            Classification::NoAnimal,
        ];
        let json = serde_json::to_string(&labels)?;
        assert_eq!(json, r#"["Wolf","Unsorted","No_Animal"]"#);
        let back: Vec<Classification> = serde_json::from_str(&json)?;
        assert_eq!(back, labels);
        Ok(())
    }

    #[test]
    fn ratio_guards_zero_denominator() {
        assert_eq!(ratio(3, 0), 0.0);
        assert_eq!(ratio(1, 4), 0.25);
    }
}
