use std::collections::BTreeMap;

/// The difference between two sets of named peripherals, as seen by one
/// element.
#[derive(Debug, Clone, PartialEq)]
pub struct WiredNetworkChange<P> {
    pub removed: BTreeMap<String, P>,
    pub added: BTreeMap<String, P>,
}

impl<P> Default for WiredNetworkChange<P> {
    fn default() -> Self {
        Self {
            removed: BTreeMap::new(),
            added: BTreeMap::new(),
        }
    }
}

impl<P: Clone + PartialEq> WiredNetworkChange<P> {
    /// What changes going from `old` to `new`. A name whose peripheral was
    /// replaced appears in both `removed` and `added`.
    pub fn between(old: &BTreeMap<String, P>, new: &BTreeMap<String, P>) -> Self {
        let removed = old
            .iter()
            .filter(|(name, peripheral)| new.get(*name) != Some(*peripheral))
            .map(|(name, peripheral)| (name.clone(), peripheral.clone()))
            .collect();
        let added = new
            .iter()
            .filter(|(name, peripheral)| old.get(*name) != Some(*peripheral))
            .map(|(name, peripheral)| (name.clone(), peripheral.clone()))
            .collect();
        Self { removed, added }
    }

    pub fn added(peripherals: BTreeMap<String, P>) -> Self {
        Self {
            removed: BTreeMap::new(),
            added: peripherals,
        }
    }

    pub fn removed(peripherals: BTreeMap<String, P>) -> Self {
        Self {
            removed: peripherals,
            added: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    /// Apply this change to a set of visible peripherals.
    pub fn apply(&self, peripherals: &mut BTreeMap<String, P>) {
        for name in self.removed.keys() {
            peripherals.remove(name);
        }
        peripherals.extend(
            self.added
                .iter()
                .map(|(name, peripheral)| (name.clone(), peripheral.clone())),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, u32)]) -> BTreeMap<String, u32> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn replaced_peripherals_are_removed_and_added() {
        let change = WiredNetworkChange::between(&map(&[("a", 1), ("b", 2)]), &map(&[("b", 3), ("c", 4)]));
        assert_eq!(change.removed, map(&[("a", 1), ("b", 2)]));
        assert_eq!(change.added, map(&[("b", 3), ("c", 4)]));
    }

    #[test]
    fn apply_reaches_the_new_set() {
        let old = map(&[("a", 1), ("b", 2)]);
        let new = map(&[("b", 3), ("c", 4)]);
        let mut seen = old.clone();
        WiredNetworkChange::between(&old, &new).apply(&mut seen);
        assert_eq!(seen, new);
        assert!(WiredNetworkChange::between(&new, &new).is_empty());
    }
}
