use std::collections::BTreeMap;

use super::tally::SpeciesTally;
use super::{ratio, Classification, ClassificationResult, Cluster, VideoThresholds};
use crate::detect::{ClassTable, FrameRecord};
use crate::taxonomy::SpeciesRoles;

/// Cluster under construction. Positions index into the frame slice.
struct OpenCluster {
    species: String,
    start: usize,
    end: usize,
    frame_count: usize,
}

impl OpenCluster {
    fn close(self, end: usize, frames: &[FrameRecord]) -> Cluster {
        Cluster {
            species: self.species,
            start_frame: frames[self.start].frame_index,
            end_frame: frames[end].frame_index,
            frame_count: self.frame_count,
        }
    }
}

/// Classify a multi-frame clip.
///
/// Frames must be in temporal order; the confidence cutoff has already been
/// applied by the ingestor.
pub fn analyze_video(
    frames: &[FrameRecord],
    classes: &ClassTable,
    roles: &SpeciesRoles,
    thresholds: &VideoThresholds,
) -> ClassificationResult {
    let total_frames = frames.len();
    let empty_break = thresholds.consecutive_empty_frames.max(1) as usize;

    let mut species_counts = SpeciesTally::seeded(classes.species());
    let mut species_frames = SpeciesTally::new();
    let mut frames_with_detections = 0usize;
    let mut empty_run = 0usize;
    let mut current_species: Option<String> = None;
    let mut species_transitions = 0u32;
    let mut open: Option<OpenCluster> = None;
    let mut clusters = Vec::new();

    for (i, frame) in frames.iter().enumerate() {
        if frame.is_empty() {
            empty_run += 1;
            if empty_run >= empty_break {
                if let Some(cluster) = open.take() {
                    clusters.push(cluster.close(i - empty_run, frames));
                }
            }
            continue;
        }

        frames_with_detections += 1;
        empty_run = 0;

        let mut frame_species = SpeciesTally::new();
        for detection in &frame.detections {
            species_counts.add(&detection.class_name);
            frame_species.add(&detection.class_name);
        }
        for (species, _) in frame_species.observed() {
            species_frames.add(species);
        }

        let Some((dominant, _)) = frame_species.leader() else {
            continue;
        };

        if current_species.as_deref().is_some_and(|prev| prev != dominant) {
            species_transitions += 1;
        }
        current_species = Some(dominant.to_string());

        match open.as_mut().filter(|cluster| cluster.species == dominant) {
            Some(cluster) => {
                cluster.end = i;
                cluster.frame_count += 1;
            }
            None => {
                if let Some(cluster) = open.take() {
                    clusters.push(cluster.close(i - 1, frames));
                }
                open = Some(OpenCluster {
                    species: dominant.to_string(),
                    start: i,
                    end: i,
                    frame_count: 1,
                });
            }
        }
    }

    if let Some(cluster) = open.take() {
        let end = cluster.end;
        clusters.push(cluster.close(end, frames));
    }
    clusters.sort_by(|a, b| b.frame_count.cmp(&a.frame_count));

    let total_detections = species_counts.total();
    let species_percentages = species_counts
        .observed()
        .map(|(species, count)| (species.to_string(), ratio(count, total_detections)))
        .collect();
    let species_frame_percentages: BTreeMap<String, f64> = species_frames
        .observed()
        .map(|(species, count)| (species.to_string(), ratio(count, total_frames)))
        .collect();

    let dominant = species_counts
        .leader()
        .map(|(species, count)| (species.to_string(), ratio(count, total_detections)));
    let predator_prey_conflict = roles.conflict(species_counts.observed().map(|(s, _)| s));
    let significant_species = species_frame_percentages
        .values()
        .filter(|&&share| share >= thresholds.significant_frame_fraction)
        .count();

    let (classification, reason) = if frames_with_detections == 0 {
        (
            Classification::NoAnimal,
            "No animals detected in any frames".to_string(),
        )
    } else if predator_prey_conflict {
        (
            Classification::Unsorted,
            "Both predator and prey detected".to_string(),
        )
    } else if species_transitions > thresholds.max_species_transitions && significant_species > 1
    {
        (
            Classification::Unsorted,
            format!("Too many species transitions ({})", species_transitions),
        )
    } else {
        match dominant {
            Some((species, share)) if share >= thresholds.dominant_species_threshold => {
                let reason = format!(
                    "Dominant species ({}) with {:.1}% of detections",
                    species,
                    share * 100.0
                );
                (Classification::Species(species), reason)
            }
            _ => (
                Classification::Unsorted,
                "No clear dominant species".to_string(),
            ),
        }
    };

    ClassificationResult {
        classification,
        reason,
        total_frames,
        frames_with_detections,
        detection_rate: ratio(frames_with_detections, total_frames),
        species_counts: species_counts.to_map(),
        species_percentages,
        species_frame_percentages,
        species_transitions,
        clusters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;

    fn frame(index: u64, species: &[&str]) -> FrameRecord {
        FrameRecord::new(
            index,
            index as f64 / 30.0,
            species
                .iter()
                .map(|name| Detection::new(0, *name, 0.8))
                .collect(),
        )
    }

    fn run(frames: &[FrameRecord]) -> ClassificationResult {
        analyze_video(
            frames,
            &ClassTable::new(),
            &SpeciesRoles::builtin(),
            &VideoThresholds::default(),
        )
    }

    #[test]
    fn all_empty_frames_mean_no_animal() {
        let frames: Vec<FrameRecord> = (0..10).map(|i| frame(i, &[])).collect();
        let result = run(&frames);
        assert_eq!(result.classification, Classification::NoAnimal);
        assert_eq!(result.frames_with_detections, 0);
        assert_eq!(result.detection_rate, 0.0);
        assert!(result.clusters.is_empty());
        assert!(!result.reason.is_empty());
    }

    #[test]
    fn single_species_clip_with_trailing_gap() {
        let mut frames: Vec<FrameRecord> = (0..18).map(|i| frame(i, &["Wolf"])).collect();
        frames.extend((18..20).map(|i| frame(i, &[])));
        let result = run(&frames);
        assert_eq!(result.classification, Classification::Species("Wolf".into()));
        assert_eq!(result.species_percentages["Wolf"], 1.0);
        assert_eq!(result.species_frame_percentages["Wolf"], 0.9);
        assert_eq!(result.detection_rate, 0.9);
        assert_eq!(result.species_transitions, 0);
        assert_eq!(
            result.clusters,
            vec![Cluster {
                species: "Wolf".into(),
                start_frame: 0,
                end_frame: 17,
                frame_count: 18,
            }]
        );
        assert_eq!(
            result.reason,
            "Dominant species (Wolf) with 100.0% of detections"
        );
    }

    #[test]
    fn alternating_species_exceed_transition_limit() {
        // Wolf and Coyote are both predators, so only the transition rule fires.
        let frames: Vec<FrameRecord> = (0..20)
            .map(|i| frame(i, &[if i % 2 == 0 { "Wolf" } else { "Coyote" }]))
            .collect();
        let result = run(&frames);
        assert_eq!(result.species_transitions, 19);
        assert_eq!(result.classification, Classification::Unsorted);
        assert_eq!(result.reason, "Too many species transitions (19)");
        assert_eq!(result.clusters.len(), 20);
    }

    #[test]
    fn predator_and_prey_anywhere_is_unsorted() {
        let mut frames: Vec<FrameRecord> = (0..50).map(|i| frame(i, &["Wolf"])).collect();
        frames.push(frame(50, &["Elk"]));
        let result = run(&frames);
        assert_eq!(result.classification, Classification::Unsorted);
        assert_eq!(result.reason, "Both predator and prey detected");
    }

    #[test]
    fn dominance_boundary_is_inclusive() {
        // 9 of 10 detections are Wolf; Raccoon is neither predator nor prey.
        let mut frames: Vec<FrameRecord> = (0..9).map(|i| frame(i, &["Wolf"])).collect();
        frames.push(frame(9, &["Raccoon"]));
        let result = run(&frames);
        assert_eq!(result.classification, Classification::Species("Wolf".into()));

        let mut frames: Vec<FrameRecord> = (0..8).map(|i| frame(i, &["Wolf"])).collect();
        frames.push(frame(8, &["Raccoon"]));
        let result = run(&frames);
        assert_eq!(result.classification, Classification::Unsorted);
        assert_eq!(result.reason, "No clear dominant species");
    }

    #[test]
    fn long_gap_splits_clusters_of_same_species() {
        let mut frames: Vec<FrameRecord> = (0..5).map(|i| frame(i, &["Bear"])).collect();
        frames.extend((5..20).map(|i| frame(i, &[])));
        frames.extend((20..23).map(|i| frame(i, &["Bear"])));
        let result = run(&frames);
        assert_eq!(result.species_transitions, 0);
        assert_eq!(
            result.clusters,
            vec![
                Cluster {
                    species: "Bear".into(),
                    start_frame: 0,
                    end_frame: 4,
                    frame_count: 5,
                },
                Cluster {
                    species: "Bear".into(),
                    start_frame: 20,
                    end_frame: 22,
                    frame_count: 3,
                },
            ]
        );
    }

    #[test]
    fn short_gap_keeps_cluster_open() {
        let mut frames: Vec<FrameRecord> = (0..3).map(|i| frame(i, &["Lynx"])).collect();
        frames.extend((3..6).map(|i| frame(i, &[])));
        frames.extend((6..8).map(|i| frame(i, &["Lynx"])));
        let result = run(&frames);
        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.clusters[0].end_frame, 7);
        assert_eq!(result.clusters[0].frame_count, 5);
    }

    #[test]
    fn frame_dominant_counts_instances_and_ties_follow_detection_order() {
        let frames = vec![
            frame(0, &["Coyote", "Wolf", "Wolf"]),
            frame(1, &["Coyote", "Wolf"]),
        ];
        let result = run(&frames);
        // Frame 0 leads with Wolf, frame 1 ties and Coyote was seen first.
        assert_eq!(result.species_transitions, 1);
        assert_eq!(result.species_counts["Wolf"], 3);
        assert_eq!(result.species_counts["Coyote"], 2);
        assert_eq!(result.clusters[0].species, "Wolf");
        assert_eq!(result.clusters[1].species, "Coyote");
    }

    #[test]
    fn overall_ties_follow_class_table_order() {
        let classes: ClassTable = [(0, "Fox".to_string()), (1, "Bear".to_string())]
            .into_iter()
            .collect();
        let frames = vec![frame(0, &["Bear"]), frame(1, &["Fox"])];
        let thresholds = VideoThresholds {
            dominant_species_threshold: 0.5,
            ..VideoThresholds::default()
        };
        let result = analyze_video(&frames, &classes, &SpeciesRoles::builtin(), &thresholds);
        assert_eq!(result.classification, Classification::Species("Fox".into()));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let frames: Vec<FrameRecord> = (0..30)
            .map(|i| {
                let species: &[&str] = if i % 3 == 0 {
                    &["Elk", "Moose"]
                } else {
                    &["Moose"]
                };
                frame(i, species)
            })
            .collect();
        assert_eq!(run(&frames), run(&frames));
    }
}
