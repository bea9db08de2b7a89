use std::collections::BTreeMap;

/// Class-id → species-name table published alongside the detector weights.
///
/// Iteration order is ascending class id. The classifier seeds its counters
/// in this order, so it also decides overall-dominant ties.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassTable {
    names: BTreeMap<u32, String>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class_id: u32, name: impl Into<String>) {
        self.names.insert(class_id, name.into());
    }

    /// Name for `class_id`, or a stable `class_<id>` placeholder.
    pub fn name_of(&self, class_id: u32) -> String {
        self.names
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }

    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.names.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(u32, String)> for ClassTable {
    fn from_iter<T: IntoIterator<Item = (u32, String)>>(iter: T) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_class_ids_get_placeholder_names() {
        let table: ClassTable = [(0, "Wolf".to_string()), (3, "Elk".to_string())]
            .into_iter()
            .collect();
        assert_eq!(table.name_of(0), "Wolf");
        assert_eq!(table.name_of(7), "class_7");
    }

    #[test]
    fn species_iterate_in_class_id_order() {
        let mut table = ClassTable::new();
        table.insert(5, "Moose");
        table.insert(1, "Cougar");
        table.insert(3, "Fox");
        let names: Vec<&str> = table.species().collect();
        assert_eq!(names, vec!["Cougar", "Fox", "Moose"]);
    }
}
