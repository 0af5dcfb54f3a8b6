use std::collections::BTreeSet;

/// Natural keys of the primary entity written during a run.
///
/// Duplicates collapse and iteration is ascending, so invalidation is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchedIdentifiers {
    ids: BTreeSet<i64>,
}

impl TouchedIdentifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: i64) -> bool {
        self.ids.insert(id)
    }

    pub fn extend(&mut self, other: TouchedIdentifiers) {
        self.ids.extend(other.ids);
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.ids.iter().copied()
    }
}

impl FromIterator<i64> for TouchedIdentifiers {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
