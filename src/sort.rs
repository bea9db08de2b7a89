//! Filesystem sorter.
//!
//! Copies each classified media file into the folder its label resolves to.
//! Originals are never moved or modified.

use anyhow::{anyhow, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::classify::Classification;
use crate::taxonomy::{folder_layout, resolve_folder, Taxonomy};

pub struct Sorter {
    root: PathBuf,
    taxonomy: Taxonomy,
}

impl Sorter {
    pub fn new(root: impl Into<PathBuf>, taxonomy: Taxonomy) -> Self {
        Self {
            root: root.into(),
            taxonomy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the fixed folder layout under the output root.
    pub fn prepare(&self) -> Result<()> {
        for dir in folder_layout(&self.taxonomy) {
            let path = self.root.join(dir);
            fs::create_dir_all(&path)
                .map_err(|e| anyhow!("failed to create {}: {}", path.display(), e))?;
        }
        Ok(())
    }

    /// Folder a classification lands in, without touching the filesystem.
    pub fn folder_for(&self, classification: &Classification) -> PathBuf {
        self.root
            .join(resolve_folder(classification.label(), &self.taxonomy).relative_path())
    }

    /// Copy `source` into its classification folder and return the new path.
    ///
    /// Folders for species outside the taxonomy are created on demand. When
    /// the target name is taken, the source's modification time (seconds) is
    /// appended to the file stem.
    pub fn sort_file(&self, source: &Path, classification: &Classification) -> Result<PathBuf> {
        let destination = resolve_folder(classification.label(), &self.taxonomy);
        let folder = self.root.join(destination.relative_path());
        if destination.is_other() && !folder.is_dir() {
            log::info!("creating {} for species outside the taxonomy", folder.display());
        }
        fs::create_dir_all(&folder)
            .map_err(|e| anyhow!("failed to create {}: {}", folder.display(), e))?;

        let file_name = source
            .file_name()
            .ok_or_else(|| anyhow!("{} has no file name", source.display()))?;
        let mut target = folder.join(file_name);
        if target.exists() {
            target = folder.join(collision_name(source)?);
        }

        log::info!("copying {} -> {}", source.display(), target.display());
        fs::copy(source, &target).map_err(|e| {
            anyhow!(
                "failed to copy {} to {}: {}",
                source.display(),
                target.display(),
                e
            )
        })?;
        Ok(target)
    }
}

fn collision_name(source: &Path) -> Result<String> {
    let modified = fs::metadata(source)?.modified()?;
    let secs = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(match source.extension() {
        Some(ext) => format!("{}_{}.{}", stem, secs, ext.to_string_lossy()),
        None => format!("{}_{}", stem, secs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_creates_layout() -> Result<()> {
        let out = tempfile::tempdir()?;
        let sorter = Sorter::new(out.path(), Taxonomy::builtin());
        sorter.prepare()?;
        assert!(out.path().join("Sorted/Predators/Wolf").is_dir());
        assert!(out.path().join("Sorted/Other").is_dir());
        assert!(out.path().join("Unsorted").is_dir());
        assert!(out.path().join("No_Animal").is_dir());
        Ok(())
    }

    #[test]
    fn unknown_species_folder_created_on_demand() -> Result<()> {
        let input = tempfile::tempdir()?;
        let out = tempfile::tempdir()?;
        let source = input.path().join("clip.mp4");
        fs::write(&source, b"clip")?;

        let sorter = Sorter::new(out.path(), Taxonomy::builtin());
        let target = sorter.sort_file(&source, &Classification::Species("Raccoon".into()))?;
        assert_eq!(target, out.path().join("Sorted/Other/Raccoon/clip.mp4"));
        assert_eq!(fs::read(&target)?, b"clip");
        assert!(source.exists());
        Ok(())
    }

    #[test]
    fn name_collision_appends_mtime() -> Result<()> {
        let input = tempfile::tempdir()?;
        let out = tempfile::tempdir()?;
        let source = input.path().join("IMG_1.jpg");
        fs::write(&source, b"still")?;

        let sorter = Sorter::new(out.path(), Taxonomy::builtin());
        let first = sorter.sort_file(&source, &Classification::Unsorted)?;
        let second = sorter.sort_file(&source, &Classification::Unsorted)?;
        assert_eq!(first, out.path().join("Unsorted/IMG_1.jpg"));
        assert_ne!(first, second);
        let name = second
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        assert!(name.starts_with("IMG_1_"));
        assert!(name.ends_with(".jpg"));
        Ok(())
    }

    #[test]
    fn folder_for_uses_taxonomy() {
        let sorter = Sorter::new("/out", Taxonomy::builtin());
        assert_eq!(
            sorter.folder_for(&Classification::Species("Moose".into())),
            PathBuf::from("/out/Sorted/Ungulates/Moose")
        );
        assert_eq!(
            sorter.folder_for(&Classification::NoAnimal),
            PathBuf::from("/out/No_Animal")
        );
    }
}
