use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::classify::{Classifier, ImageThresholds, Thresholds, VideoThresholds};
use crate::detect::ClassTable;
use crate::ingest::MediaKind;
use crate::taxonomy::{SpeciesRoles, Taxonomy};

pub const CONFIG_ENV: &str = "WOLFVUE_CONFIG";

const DEFAULT_VIDEO_CONFIDENCE: f32 = 0.40;
const DEFAULT_IMAGE_CONFIDENCE: f32 = 0.35;

#[derive(Debug, Deserialize, Default)]
struct SorterConfigFile {
    /// Class id (as a string key) → species name.
    names: Option<BTreeMap<String, String>>,
    taxonomy: Option<Taxonomy>,
    predators: Option<Vec<String>>,
    prey: Option<Vec<String>>,
    video: Option<VideoConfigFile>,
    image: Option<ImageConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    confidence_threshold: Option<f32>,
    dominant_species_threshold: Option<f64>,
    max_species_transitions: Option<u32>,
    consecutive_empty_frames: Option<u32>,
    significant_frame_fraction: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct ImageConfigFile {
    confidence_threshold: Option<f32>,
    min_detections: Option<usize>,
    unsorted_min_confidence: Option<f32>,
    unsorted_max_confidence: Option<f32>,
    multi_species_threshold: Option<f32>,
}

/// Everything the sorter reads from configuration.
#[derive(Debug, Clone)]
pub struct SorterConfig {
    pub classes: ClassTable,
    pub taxonomy: Taxonomy,
    pub roles: SpeciesRoles,
    pub thresholds: Thresholds,
    /// Detections below this are dropped when ingesting videos.
    pub video_confidence: f32,
    /// Detections below this are dropped when ingesting still images.
    pub image_confidence: f32,
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            classes: ClassTable::new(),
            taxonomy: Taxonomy::builtin(),
            roles: SpeciesRoles::builtin(),
            thresholds: Thresholds::default(),
            video_confidence: DEFAULT_VIDEO_CONFIDENCE,
            image_confidence: DEFAULT_IMAGE_CONFIDENCE,
        }
    }
}

impl SorterConfig {
    /// Load from the file named by `WOLFVUE_CONFIG` (if set), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (or defaults when `None`), then apply
    /// environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SorterConfigFile) -> Result<Self> {
        let classes = match file.names {
            Some(names) => parse_class_names(names)?,
            None => ClassTable::new(),
        };
        let taxonomy = match file.taxonomy {
            Some(taxonomy) => taxonomy,
            None => {
                log::info!("no taxonomy in config, using built-in taxonomy");
                Taxonomy::builtin()
            }
        };
        let builtin_roles = SpeciesRoles::builtin();
        let roles = SpeciesRoles::new(
            file.predators
                .unwrap_or_else(|| builtin_roles.predators().map(str::to_string).collect()),
            file.prey
                .unwrap_or_else(|| builtin_roles.prey().map(str::to_string).collect()),
        );

        let video = file.video.unwrap_or_default();
        let image = file.image.unwrap_or_default();
        let video_defaults = VideoThresholds::default();
        let image_defaults = ImageThresholds::default();
        let thresholds = Thresholds {
            video: VideoThresholds {
                dominant_species_threshold: video
                    .dominant_species_threshold
                    .unwrap_or(video_defaults.dominant_species_threshold),
                max_species_transitions: video
                    .max_species_transitions
                    .unwrap_or(video_defaults.max_species_transitions),
                consecutive_empty_frames: video
                    .consecutive_empty_frames
                    .unwrap_or(video_defaults.consecutive_empty_frames),
                significant_frame_fraction: video
                    .significant_frame_fraction
                    .unwrap_or(video_defaults.significant_frame_fraction),
            },
            image: ImageThresholds {
                min_detections: image.min_detections.unwrap_or(image_defaults.min_detections),
                unsorted_min_confidence: image
                    .unsorted_min_confidence
                    .unwrap_or(image_defaults.unsorted_min_confidence),
                unsorted_max_confidence: image
                    .unsorted_max_confidence
                    .unwrap_or(image_defaults.unsorted_max_confidence),
                multi_species_gap: image
                    .multi_species_threshold
                    .unwrap_or(image_defaults.multi_species_gap),
            },
        };

        Ok(Self {
            classes,
            taxonomy,
            roles,
            thresholds,
            video_confidence: video.confidence_threshold.unwrap_or(DEFAULT_VIDEO_CONFIDENCE),
            image_confidence: image.confidence_threshold.unwrap_or(DEFAULT_IMAGE_CONFIDENCE),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(value) = env_parse::<f32>("WOLFVUE_CONFIDENCE")? {
            self.video_confidence = value;
        }
        if let Some(value) = env_parse::<f32>("WOLFVUE_IMAGE_CONFIDENCE")? {
            self.image_confidence = value;
        }
        if let Some(value) = env_parse::<f64>("WOLFVUE_DOMINANT_THRESHOLD")? {
            self.thresholds.video.dominant_species_threshold = value;
        }
        if let Some(value) = env_parse::<u32>("WOLFVUE_MAX_TRANSITIONS")? {
            self.thresholds.video.max_species_transitions = value;
        }
        if let Some(value) = env_parse::<u32>("WOLFVUE_EMPTY_FRAMES")? {
            self.thresholds.video.consecutive_empty_frames = value;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        check_fraction("video.confidence_threshold", self.video_confidence as f64)?;
        check_fraction("image.confidence_threshold", self.image_confidence as f64)?;
        let video = &self.thresholds.video;
        check_fraction(
            "video.dominant_species_threshold",
            video.dominant_species_threshold,
        )?;
        check_fraction(
            "video.significant_frame_fraction",
            video.significant_frame_fraction,
        )?;
        if video.consecutive_empty_frames == 0 {
            return Err(anyhow!("video.consecutive_empty_frames must be at least 1"));
        }
        let image = &self.thresholds.image;
        check_fraction(
            "image.unsorted_min_confidence",
            image.unsorted_min_confidence as f64,
        )?;
        check_fraction(
            "image.unsorted_max_confidence",
            image.unsorted_max_confidence as f64,
        )?;
        check_fraction("image.multi_species_threshold", image.multi_species_gap as f64)?;
        if image.unsorted_min_confidence > image.unsorted_max_confidence {
            return Err(anyhow!(
                "image.unsorted_min_confidence must not exceed image.unsorted_max_confidence"
            ));
        }
        if self.image_confidence > image.unsorted_min_confidence {
            log::warn!(
                "image confidence floor {:.2} is above the unsorted band ({:.2}-{:.2}); low-confidence images will never reach it",
                self.image_confidence,
                image.unsorted_min_confidence,
                image.unsorted_max_confidence
            );
        }
        self.taxonomy.validate()?;
        if self.taxonomy.is_empty() {
            log::warn!("taxonomy is empty; every species will be sorted under Other");
        }
        let overlap = self.roles.overlap();
        if !overlap.is_empty() {
            log::warn!(
                "species listed as both predator and prey: {}",
                overlap.join(", ")
            );
        }
        Ok(())
    }

    /// Ingestion cutoff for a media kind.
    pub fn confidence_floor(&self, kind: MediaKind) -> f32 {
        match kind {
            MediaKind::Video => self.video_confidence,
            MediaKind::Image => self.image_confidence,
        }
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.classes.clone(), self.roles.clone(), self.thresholds)
    }
}

fn read_config_file(path: &Path) -> Result<SorterConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_class_names(names: BTreeMap<String, String>) -> Result<ClassTable> {
    names
        .into_iter()
        .map(|(id, name)| {
            let id: u32 = id
                .trim()
                .parse()
                .map_err(|_| anyhow!("class id {:?} in names must be an integer", id))?;
            Ok((id, name))
        })
        .collect()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} has an invalid value: {:?}", key, value)),
        _ => Ok(None),
    }
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be within 0.0..=1.0 (got {})", name, value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() -> Result<()> {
        let cfg = SorterConfig::from_file(toml::from_str("")?)?;
        assert_eq!(cfg.video_confidence, DEFAULT_VIDEO_CONFIDENCE);
        assert_eq!(cfg.image_confidence, DEFAULT_IMAGE_CONFIDENCE);
        assert_eq!(cfg.thresholds, Thresholds::default());
        assert_eq!(cfg.taxonomy, Taxonomy::builtin());
        assert!(cfg.roles.is_predator("Wolf"));
        assert!(cfg.roles.is_prey("Elk"));
        Ok(())
    }

    #[test]
    fn names_and_sections_are_parsed() -> Result<()> {
        let raw = r#"
            predators = ["Wolf"]
            prey = ["Elk"]

            [names]
            0 = "Wolf"
            1 = "Elk"

            [taxonomy.Canids]
            Wolf = ["Wolf"]

            [video]
            confidence_threshold = 0.5
            max_species_transitions = 3

            [image]
            unsorted_min_confidence = 0.3
            multi_species_threshold = 0.4
        "#;
        let cfg = SorterConfig::from_file(toml::from_str(raw)?)?;
        assert_eq!(cfg.classes.name_of(1), "Elk");
        assert_eq!(cfg.taxonomy.category_of("Wolf"), Some("Canids"));
        assert!(!cfg.roles.is_predator("Bear"));
        assert_eq!(cfg.video_confidence, 0.5);
        assert_eq!(cfg.thresholds.video.max_species_transitions, 3);
        assert_eq!(cfg.thresholds.video.consecutive_empty_frames, 15);
        assert_eq!(cfg.thresholds.image.unsorted_min_confidence, 0.3);
        assert_eq!(cfg.thresholds.image.multi_species_gap, 0.4);
        Ok(())
    }

    #[test]
    fn non_numeric_class_ids_are_rejected() -> Result<()> {
        let file: SorterConfigFile = toml::from_str("[names]\nwolf = \"Wolf\"\n")?;
        assert!(SorterConfig::from_file(file).is_err());
        Ok(())
    }

    #[test]
    fn inverted_band_fails_validation() {
        let mut cfg = SorterConfig::default();
        cfg.thresholds.image.unsorted_min_confidence = 0.7;
        cfg.thresholds.image.unsorted_max_confidence = 0.4;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn out_of_range_fraction_fails_validation() {
        let mut cfg = SorterConfig::default();
        cfg.thresholds.video.dominant_species_threshold = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_empty_frame_break_fails_validation() {
        let mut cfg = SorterConfig::default();
        cfg.thresholds.video.consecutive_empty_frames = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn floor_follows_media_kind() {
        let cfg = SorterConfig::default();
        assert_eq!(cfg.confidence_floor(MediaKind::Video), 0.40);
        assert_eq!(cfg.confidence_floor(MediaKind::Image), 0.35);
    }
}
