//! Species taxonomy, predator/prey roles and folder resolution.
//!
//! Resolution is pure: it decides a relative destination folder for a
//! classification label and never touches the filesystem. Creating the
//! folders is the sorter's job.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::OnceLock;

pub const UNSORTED_LABEL: &str = "Unsorted";
pub const NO_ANIMAL_LABEL: &str = "No_Animal";
pub const SORTED_DIR: &str = "Sorted";
pub const OTHER_CATEGORY: &str = "Other";

const MAX_COMPONENT_LEN: usize = 64;

// -------------------- Taxonomy --------------------

/// Category → species → reserved per-species metadata (currently unused).
///
/// Both levels iterate in name order, which keeps resolution deterministic
/// when a species is listed under more than one category.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Taxonomy {
    categories: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl Taxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    /// The taxonomy used when a config file carries none.
    pub fn builtin() -> Self {
        let mut taxonomy = Self::new();
        for species in ["WhiteTail", "MuleDeer", "Elk", "Moose"] {
            taxonomy.insert("Ungulates", species);
        }
        for species in ["Cougar", "Lynx", "Wolf", "Coyote", "Fox", "Bear"] {
            taxonomy.insert("Predators", species);
        }
        taxonomy
    }

    pub fn insert(&mut self, category: &str, species: &str) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .entry(species.to_string())
            .or_default();
    }

    /// First category (in name order) listing `species`.
    pub fn category_of(&self, species: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|(_, members)| members.contains_key(species))
            .map(|(category, _)| category.as_str())
    }

    /// Categories with their species, both in name order.
    pub fn categories(&self) -> Vec<(&str, Vec<&str>)> {
        self.categories
            .iter()
            .map(|(category, members)| {
                (
                    category.as_str(),
                    members.keys().map(String::as_str).collect(),
                )
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Reject category or species names that cannot be used as a single
    /// folder component.
    pub fn validate(&self) -> Result<()> {
        for (category, members) in &self.categories {
            validate_folder_component(category)?;
            for species in members.keys() {
                validate_folder_component(species)?;
            }
        }
        Ok(())
    }
}

// -------------------- Predator / Prey Roles --------------------

/// Predator and prey species sets.
///
/// The sets are expected to be disjoint; `overlap` reports violations so the
/// config layer can warn about them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpeciesRoles {
    predators: BTreeSet<String>,
    prey: BTreeSet<String>,
}

impl SpeciesRoles {
    pub fn new<P, Q>(predators: P, prey: Q) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        Q: IntoIterator,
        Q::Item: Into<String>,
    {
        Self {
            predators: predators.into_iter().map(Into::into).collect(),
            prey: prey.into_iter().map(Into::into).collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(
            ["Cougar", "Lynx", "Wolf", "Coyote", "Fox", "Bear"],
            ["WhiteTail", "MuleDeer", "Elk", "Moose"],
        )
    }

    pub fn is_predator(&self, species: &str) -> bool {
        self.predators.contains(species)
    }

    pub fn is_prey(&self, species: &str) -> bool {
        self.prey.contains(species)
    }

    /// True when the given species include at least one predator and at
    /// least one prey species.
    pub fn conflict<'a, I>(&self, present: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut has_predator = false;
        let mut has_prey = false;
        for species in present {
            has_predator |= self.is_predator(species);
            has_prey |= self.is_prey(species);
            if has_predator && has_prey {
                return true;
            }
        }
        false
    }

    /// Species listed as both predator and prey.
    pub fn overlap(&self) -> Vec<String> {
        self.predators.intersection(&self.prey).cloned().collect()
    }

    pub fn predators(&self) -> impl Iterator<Item = &str> {
        self.predators.iter().map(String::as_str)
    }

    pub fn prey(&self) -> impl Iterator<Item = &str> {
        self.prey.iter().map(String::as_str)
    }
}

// -------------------- Folder Resolution --------------------

/// Destination bucket for a classified file, relative to the output root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Destination {
    Unsorted,
    NoAnimal,
    Sorted { category: String, species: String },
}

impl Destination {
    pub fn relative_path(&self) -> PathBuf {
        match self {
            Destination::Unsorted => PathBuf::from(UNSORTED_LABEL),
            Destination::NoAnimal => PathBuf::from(NO_ANIMAL_LABEL),
            Destination::Sorted { category, species } => {
                [SORTED_DIR, category.as_str(), species.as_str()]
                    .iter()
                    .collect()
            }
        }
    }

    /// True for species that fell through to the dynamic `Other` category.
    pub fn is_other(&self) -> bool {
        matches!(self, Destination::Sorted { category, .. } if category == OTHER_CATEGORY)
    }
}

/// Map a classification label to its destination folder.
///
/// Labels absent from the taxonomy land in `Sorted/Other/<label>`. The same
/// label always resolves to the same destination.
pub fn resolve_folder(label: &str, taxonomy: &Taxonomy) -> Destination {
    match label {
        UNSORTED_LABEL => Destination::Unsorted,
        NO_ANIMAL_LABEL => Destination::NoAnimal,
        species => match taxonomy.category_of(species) {
            Some(category) => Destination::Sorted {
                category: category.to_string(),
                species: species.to_string(),
            },
            None => Destination::Sorted {
                category: OTHER_CATEGORY.to_string(),
                species: sanitize_folder_component(species),
            },
        },
    }
}

/// Every directory the sorter prepares up front, relative to the output root.
pub fn folder_layout(taxonomy: &Taxonomy) -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from(SORTED_DIR),
        PathBuf::from(UNSORTED_LABEL),
        PathBuf::from(NO_ANIMAL_LABEL),
    ];
    for (category, species) in taxonomy.categories() {
        let category_dir = PathBuf::from(SORTED_DIR).join(category);
        dirs.push(category_dir.clone());
        dirs.extend(species.into_iter().map(|name| category_dir.join(name)));
    }
    dirs.push(PathBuf::from(SORTED_DIR).join(OTHER_CATEGORY));
    dirs
}

fn folder_component_re() -> &'static regex::Regex {
    static COMPONENT_RE: OnceLock<regex::Regex> = OnceLock::new();
    COMPONENT_RE.get_or_init(|| {
        regex::Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("folder component pattern")
    })
}

fn validate_folder_component(name: &str) -> Result<()> {
    if !folder_component_re().is_match(name) {
        return Err(anyhow!(
            "taxonomy name {:?} must match ^[A-Za-z0-9_-]{{1,64}}$",
            name
        ));
    }
    Ok(())
}

/// Detector labels are untrusted; anything outside `[A-Za-z0-9_-]` becomes `_`.
fn sanitize_folder_component(name: &str) -> String {
    if folder_component_re().is_match(name) {
        return name.to_string();
    }
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_COMPONENT_LEN)
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn special_labels_map_to_top_level_buckets() {
        let taxonomy = Taxonomy::builtin();
        assert_eq!(
            resolve_folder("Unsorted", &taxonomy).relative_path(),
            Path::new("Unsorted")
        );
        assert_eq!(
            resolve_folder("No_Animal", &taxonomy).relative_path(),
            Path::new("No_Animal")
        );
    }

    #[test]
    fn known_species_resolve_under_their_category() {
        let taxonomy = Taxonomy::builtin();
        let dest = resolve_folder("Elk", &taxonomy);
        assert_eq!(dest.relative_path(), Path::new("Sorted/Ungulates/Elk"));
        assert!(!dest.is_other());
    }

    #[test]
    fn unknown_species_route_to_other_every_time() {
        let taxonomy = Taxonomy::builtin();
        let first = resolve_folder("Raccoon", &taxonomy);
        let second = resolve_folder("Raccoon", &taxonomy);
        assert_eq!(first, second);
        assert!(first.is_other());
        assert_eq!(first.relative_path(), Path::new("Sorted/Other/Raccoon"));
    }

    #[test]
    fn unsafe_labels_cannot_escape_the_other_folder() {
        let dest = resolve_folder("../etc", &Taxonomy::new());
        assert_eq!(dest.relative_path(), Path::new("Sorted/Other/___etc"));
    }

    #[test]
    fn duplicated_species_resolve_to_first_category_by_name() {
        let mut taxonomy = Taxonomy::new();
        taxonomy.insert("Zoo", "Bear");
        taxonomy.insert("Carnivores", "Bear");
        assert_eq!(taxonomy.category_of("Bear"), Some("Carnivores"));
    }

    #[test]
    fn inserted_species_carry_no_metadata() -> Result<()> {
        let mut taxonomy = Taxonomy::new();
        taxonomy.insert("Predators", "Wolf");
        let json = serde_json::to_string(&taxonomy)?;
        assert_eq!(json, r#"{"Predators":{"Wolf":[]}}"#);
        Ok(())
    }

    #[test]
    fn layout_lists_every_species_folder_and_other() {
        let dirs = folder_layout(&Taxonomy::builtin());
        assert!(dirs.contains(&PathBuf::from("Sorted/Predators/Wolf")));
        assert!(dirs.contains(&PathBuf::from("Sorted/Ungulates/Moose")));
        assert!(dirs.contains(&PathBuf::from("Sorted/Other")));
        assert!(dirs.contains(&PathBuf::from("No_Animal")));
    }

    #[test]
    fn roles_detect_conflict_only_with_both_sides() {
        let roles = SpeciesRoles::builtin();
        assert!(roles.conflict(["Wolf", "Elk"]));
        assert!(!roles.conflict(["Wolf", "Coyote"]));
        assert!(!roles.conflict(["Raccoon", "Elk"]));
    }

    #[test]
    fn overlap_reports_species_in_both_sets() {
        let roles = SpeciesRoles::new(["Wolf", "Bear"], ["Bear", "Elk"]);
        assert_eq!(roles.overlap(), vec!["Bear".to_string()]);
    }

    #[test]
    fn validate_rejects_path_like_names() {
        let mut taxonomy = Taxonomy::new();
        taxonomy.insert("Predators", "Wolf/Grey");
        assert!(taxonomy.validate().is_err());
        assert!(Taxonomy::builtin().validate().is_ok());
    }
}
