//! Batch processing over input folders.
//!
//! For each media file: read its sidecar, classify, copy into the output
//! layout. Files that fail ingestion or copying are logged and recorded; the
//! rest of the batch carries on.

use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::classify::Classification;
use crate::config::SorterConfig;
use crate::detect::FrameRecord;
use crate::ingest::{discover_media, IngestError, MediaFile, SidecarConfig, SidecarSource};
use crate::report::FileOutcome;
use crate::sort::Sorter;

/// A classified file that could not be copied into the output layout.
#[derive(Debug)]
pub struct SortFailure {
    pub path: PathBuf,
    pub classification: Classification,
    pub error: anyhow::Error,
}

/// Everything one batch run produced.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<FileOutcome>,
    pub skipped: Vec<IngestError>,
    pub failed: Vec<SortFailure>,
    /// Detection instances per species, keyed by input folder.
    pub detections_by_dir: BTreeMap<PathBuf, BTreeMap<String, usize>>,
    /// True when `should_stop` ended the run early.
    pub interrupted: bool,
}

/// Classify and sort every media file in `inputs`.
///
/// `should_stop` is polled between files.
pub fn run_batch(
    inputs: &[PathBuf],
    config: &SorterConfig,
    sorter: &Sorter,
    should_stop: impl Fn() -> bool,
) -> Result<BatchSummary> {
    let classifier = config.classifier();
    let mut summary = BatchSummary::default();

    'dirs: for input in inputs {
        let files = discover_media(input)
            .map_err(|e| anyhow!("failed to list {}: {}", input.display(), e))?;
        log::info!("{}: {} media files", input.display(), files.len());
        let dir_counts = summary.detections_by_dir.entry(input.clone()).or_default();

        for file in files {
            if should_stop() {
                summary.interrupted = true;
                break 'dirs;
            }
            let frames = match read_file(&file, config) {
                Ok(frames) => frames,
                Err(err) => {
                    log::warn!("skipping {}", err);
                    summary.skipped.push(err);
                    continue;
                }
            };

            let result = classifier.classify(&frames);
            log::info!(
                "{}: {} ({})",
                file.path.display(),
                result.classification,
                result.reason
            );
            for (species, count) in &result.species_counts {
                *dir_counts.entry(species.clone()).or_default() += count;
            }

            let target_path = match sorter.sort_file(&file.path, &result.classification) {
                Ok(target_path) => target_path,
                Err(error) => {
                    log::warn!("failed to sort {}: {:#}", file.path.display(), error);
                    summary.failed.push(SortFailure {
                        path: file.path,
                        classification: result.classification,
                        error,
                    });
                    continue;
                }
            };
            summary.outcomes.push(FileOutcome {
                original_path: file.path,
                target_path,
                media_kind: file.kind,
                result,
            });
        }
    }
    Ok(summary)
}

fn read_file(file: &MediaFile, config: &SorterConfig) -> Result<Vec<FrameRecord>, IngestError> {
    let mut source = SidecarSource::new(
        SidecarConfig {
            media_path: file.path.clone(),
            kind: file.kind,
            confidence_floor: config.confidence_floor(file.kind),
        },
        &config.classes,
    );
    source.read_frames()
}
