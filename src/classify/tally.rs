use std::collections::{BTreeMap, HashMap};

/// Per-species counter that remembers slot order.
///
/// Slots are assigned on first sight (or up front via `seeded`), and every
/// "which species leads" question breaks ties toward the lower slot. That
/// makes leader selection independent of hash order.
#[derive(Clone, Debug, Default)]
pub(crate) struct SpeciesTally {
    slots: HashMap<String, usize>,
    names: Vec<String>,
    counts: Vec<usize>,
}

impl SpeciesTally {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Pre-assign slots in the given order, all at zero.
    pub(crate) fn seeded<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tally = Self::new();
        for name in names {
            tally.slot(name);
        }
        tally
    }

    fn slot(&mut self, species: &str) -> usize {
        if let Some(&slot) = self.slots.get(species) {
            return slot;
        }
        let slot = self.names.len();
        self.slots.insert(species.to_string(), slot);
        self.names.push(species.to_string());
        self.counts.push(0);
        slot
    }

    pub(crate) fn add(&mut self, species: &str) {
        let slot = self.slot(species);
        self.counts[slot] += 1;
    }

    pub(crate) fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Species with a non-zero count, in slot order.
    pub(crate) fn observed(&self) -> impl Iterator<Item = (&str, usize)> {
        self.names
            .iter()
            .zip(&self.counts)
            .filter(|(_, &count)| count > 0)
            .map(|(name, &count)| (name.as_str(), count))
    }

    /// Highest count; ties go to the earliest slot. `None` when nothing was
    /// counted.
    pub(crate) fn leader(&self) -> Option<(&str, usize)> {
        let mut best: Option<(&str, usize)> = None;
        for (name, count) in self.observed() {
            match best {
                Some((_, top)) if top >= count => {}
                _ => best = Some((name, count)),
            }
        }
        best
    }

    pub(crate) fn to_map(&self) -> BTreeMap<String, usize> {
        self.observed()
            .map(|(name, count)| (name.to_string(), count))
            .collect()
    }
}
