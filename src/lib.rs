//! WolfVue
//!
//! Classification engine for trail-camera footage. An object detector runs
//! out of process and records per-frame detections; this crate decides what
//! each clip or still image shows and files it accordingly.
//!
//! # Labels
//!
//! Every media file ends up with exactly one label:
//!
//! 1. **Species**: one species clearly dominates the evidence.
//! 2. **Unsorted**: the evidence is ambiguous and a human should look.
//! 3. **No_Animal**: nothing qualifying was detected.
//!
//! # Module Structure
//!
//! - `detect`: Detector output (Detection, FrameRecord, ClassTable)
//! - `classify`: The decision engine for videos and still images
//! - `taxonomy`: Category tree, predator/prey roles, folder resolution
//! - `ingest`: Media discovery and detection sidecars
//! - `sort`: Copying classified files into the folder layout
//! - `batch`: Running a whole input folder through ingest, classify and sort
//! - `report`: Batch reports and directory rankings
//! - `config`: TOML configuration with environment overrides

pub mod batch;
pub mod classify;
pub mod config;
pub mod detect;
pub mod ingest;
pub mod report;
pub mod sort;
pub mod taxonomy;

pub use batch::{run_batch, BatchSummary, SortFailure};
pub use classify::{
    analyze, analyze_image, analyze_video, Classification, ClassificationResult, Classifier,
    Cluster, ImageThresholds, Thresholds, VideoThresholds,
};
pub use config::SorterConfig;
pub use detect::{ClassTable, Detection, FrameRecord};
pub use ingest::{
    discover_media, sidecar_path, IngestError, IngestStats, MediaFile, MediaKind, SidecarConfig,
    SidecarSource,
};
pub use report::{
    rank_directories, render_ranking, render_report, write_report, FileOutcome, RankEntry,
};
pub use sort::Sorter;
pub use taxonomy::{folder_layout, resolve_folder, Destination, SpeciesRoles, Taxonomy};
