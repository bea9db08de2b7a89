//! Text reports over batches of classified files.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::classify::{ratio, ClassificationResult};
use crate::ingest::MediaKind;

pub const REPORT_FILE_NAME: &str = "processing_report.txt";
pub const DEFAULT_RANK_TOP_N: usize = 5;

/// What happened to one media file.
#[derive(Clone, Debug, Serialize)]
pub struct FileOutcome {
    pub original_path: PathBuf,
    pub target_path: PathBuf,
    pub media_kind: MediaKind,
    pub result: ClassificationResult,
}

/// Render the batch summary written next to the sorted output.
pub fn render_report(outcomes: &[FileOutcome]) -> String {
    let mut out = String::new();
    let videos = outcomes
        .iter()
        .filter(|o| o.media_kind == MediaKind::Video)
        .count();
    let images = outcomes.len() - videos;

    let _ = writeln!(out, "WolfVue: Wildlife Video Classifier - Processing Report");
    let _ = writeln!(out, "====================================================");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Processed {} files ({} videos, {} images)",
        outcomes.len(),
        videos,
        images
    );
    let _ = writeln!(out);

    let mut by_label: BTreeMap<&str, usize> = BTreeMap::new();
    for outcome in outcomes {
        *by_label
            .entry(outcome.result.classification.label())
            .or_default() += 1;
    }
    let _ = writeln!(out, "Classification Summary:");
    for (label, count) in &by_label {
        let _ = writeln!(
            out,
            "  {}: {} files ({:.1}%)",
            label,
            count,
            ratio(*count, outcomes.len()) * 100.0
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Detailed Results:");
    for (i, outcome) in outcomes.iter().enumerate() {
        let result = &outcome.result;
        let species = result
            .ranked_species()
            .into_iter()
            .filter(|(_, share)| *share > 0.0)
            .map(|(name, share)| format!("{} ({:.1}%)", name, share * 100.0))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{}. {} ({})",
            i + 1,
            display_name(&outcome.original_path),
            outcome.media_kind.as_str().to_uppercase()
        );
        let _ = writeln!(out, "   Classification: {}", result.classification);
        let _ = writeln!(out, "   Reason: {}", result.reason);
        let _ = writeln!(
            out,
            "   Detection Rate: {:.1}%",
            result.detection_rate * 100.0
        );
        let _ = writeln!(out, "   Species: {}", species);
        let _ = writeln!(out, "   Sorted To: {}", outcome.target_path.display());
    }
    out
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Write a rendered report as `name` under the output root.
pub fn write_report(root: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    let path = root.join(name);
    std::fs::write(&path, contents)
        .map_err(|e| anyhow!("failed to write {}: {}", path.display(), e))?;
    Ok(path)
}

// -------------------- Directory Ranking --------------------

/// One directory's position in a species ranking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankEntry {
    pub directory: PathBuf,
    pub detections: usize,
}

/// For each species, the directories with the most detections of it.
///
/// Only directories where the species was seen are ranked; ties are ordered
/// by path. Each list is cut to `top_n`.
pub fn rank_directories(
    counts: &BTreeMap<PathBuf, BTreeMap<String, usize>>,
    top_n: usize,
) -> BTreeMap<String, Vec<RankEntry>> {
    let mut rankings: BTreeMap<String, Vec<RankEntry>> = BTreeMap::new();
    for (directory, species_counts) in counts {
        for (species, &detections) in species_counts {
            if detections == 0 {
                continue;
            }
            rankings.entry(species.clone()).or_default().push(RankEntry {
                directory: directory.clone(),
                detections,
            });
        }
    }
    for entries in rankings.values_mut() {
        // Map iteration already yields path order, so a stable sort keeps ties by path.
        entries.sort_by(|a, b| b.detections.cmp(&a.detections));
        entries.truncate(top_n);
    }
    rankings
}

/// Render per-directory totals followed by the species rankings.
pub fn render_ranking(
    counts: &BTreeMap<PathBuf, BTreeMap<String, usize>>,
    top_n: usize,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "WolfVue - Wildlife Directory Analysis Report");
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out);

    for (directory, species_counts) in counts {
        let total: usize = species_counts.values().sum();
        let _ = writeln!(out, "{}", directory.display());
        let _ = writeln!(out, "  Total detections: {}", total);
        let mut ordered: Vec<(&String, &usize)> = species_counts.iter().collect();
        ordered.sort_by(|a, b| b.1.cmp(a.1));
        for (species, count) in ordered {
            let _ = writeln!(
                out,
                "  - {}: {} ({:.1}%)",
                species,
                count,
                ratio(*count, total) * 100.0
            );
        }
        let _ = writeln!(out);
    }

    for (species, entries) in rank_directories(counts, top_n) {
        let _ = writeln!(out, "Top directories for {}:", species);
        for (i, entry) in entries.iter().enumerate() {
            let _ = writeln!(
                out,
                "  #{} {} ({} detections)",
                i + 1,
                entry.directory.display(),
                entry.detections
            );
        }
    }
    out
}
