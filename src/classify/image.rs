use std::collections::BTreeMap;

use super::tally::SpeciesTally;
use super::{ratio, Classification, ClassificationResult, ImageThresholds};
use crate::detect::FrameRecord;
use crate::taxonomy::SpeciesRoles;

/// Classify a still image from its single frame record.
///
/// Unlike the video path, the ambiguous-confidence band is checked before
/// anything else, and the predator/prey check only applies once more than
/// one species is present.
pub fn analyze_image(
    frame: &FrameRecord,
    roles: &SpeciesRoles,
    thresholds: &ImageThresholds,
) -> ClassificationResult {
    let mut species_counts = SpeciesTally::new();
    let mut confidences: BTreeMap<&str, Vec<f32>> = BTreeMap::new();
    for detection in &frame.detections {
        species_counts.add(&detection.class_name);
        confidences
            .entry(detection.class_name.as_str())
            .or_default()
            .push(detection.confidence);
    }

    // First-seen order, so equal averages rank the earlier species higher.
    let averages: Vec<(&str, f32)> = species_counts
        .observed()
        .map(|(species, _)| {
            let values = confidences.get(species).map(Vec::as_slice).unwrap_or(&[]);
            (species, mean(values))
        })
        .collect();

    let total_detections = species_counts.total();
    let max_confidence = frame
        .detections
        .iter()
        .map(|d| d.confidence)
        .fold(0.0_f32, f32::max);
    let in_unsorted_band = thresholds.unsorted_min_confidence <= max_confidence
        && max_confidence <= thresholds.unsorted_max_confidence;

    let (classification, reason) = if total_detections < thresholds.min_detections {
        (
            Classification::NoAnimal,
            format!(
                "Insufficient detections (found {}, need {})",
                total_detections, thresholds.min_detections
            ),
        )
    } else if in_unsorted_band {
        (
            Classification::Unsorted,
            format!(
                "Confidence between unsorted range ({:.2} between {:.2}-{:.2})",
                max_confidence,
                thresholds.unsorted_min_confidence,
                thresholds.unsorted_max_confidence
            ),
        )
    } else if let [(species, confidence)] = averages.as_slice() {
        (
            Classification::Species(species.to_string()),
            format!("Single species detected with {:.2} confidence", confidence),
        )
    } else if averages.len() > 1 {
        decide_multi_species(&averages, roles, thresholds)
    } else {
        (
            Classification::NoAnimal,
            "No valid detections found".to_string(),
        )
    };

    let species_percentages: BTreeMap<String, f64> = species_counts
        .observed()
        .map(|(species, count)| (species.to_string(), ratio(count, total_detections)))
        .collect();
    let frames_with_detections = usize::from(total_detections > 0);

    ClassificationResult {
        classification,
        reason,
        total_frames: 1,
        frames_with_detections,
        detection_rate: frames_with_detections as f64,
        species_counts: species_counts.to_map(),
        species_frame_percentages: species_percentages.clone(),
        species_percentages,
        species_transitions: 0,
        clusters: Vec::new(),
    }
}

fn decide_multi_species(
    averages: &[(&str, f32)],
    roles: &SpeciesRoles,
    thresholds: &ImageThresholds,
) -> (Classification, String) {
    if roles.conflict(averages.iter().map(|(species, _)| *species)) {
        return (
            Classification::Unsorted,
            "Both predator and prey detected in image".to_string(),
        );
    }

    let mut ranked = averages.to_vec();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let (top, top_conf) = ranked[0];
    let (second, second_conf) = ranked[1];

    if top_conf - second_conf >= thresholds.multi_species_gap {
        (
            Classification::Species(top.to_string()),
            format!(
                "Clear winner: {} ({:.2}) vs {} ({:.2})",
                top, top_conf, second, second_conf
            ),
        )
    } else {
        (
            Classification::Unsorted,
            format!(
                "Multiple species with similar confidence: {} ({:.2}) vs {} ({:.2})",
                top, top_conf, second, second_conf
            ),
        )
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}
