//! Multi-row selection for bulk receiving.
//!
//! Individually toggled keys survive filter changes; "select all" replaces the
//! selection with exactly the rows currently rendered. Keys whose rows vanish
//! from the dataset after a refresh are pruned.

use std::collections::BTreeSet;

use challan_core::RowKey;
use challan_records::Dataset;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    keys: BTreeSet<RowKey>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of one key. Returns whether it is now selected.
    pub fn toggle(&mut self, key: RowKey) -> bool {
        if self.keys.remove(&key) {
            false
        } else {
            self.keys.insert(key);
            true
        }
    }

    /// "Select all" checkbox: checked selects exactly `visible`, unchecked clears.
    pub fn set_all<I>(&mut self, checked: bool, visible: I)
    where
        I: IntoIterator<Item = RowKey>,
    {
        self.keys.clear();
        if checked {
            self.keys.extend(visible);
        }
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn contains(&self, key: &RowKey) -> bool {
        self.keys.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &RowKey> {
        self.keys.iter()
    }

    /// Drop keys that no longer name a row of `dataset`.
    pub fn prune(&mut self, dataset: &Dataset) -> usize {
        let before = self.keys.len();
        self.keys.retain(|key| dataset.contains_key(key));
        before - self.keys.len()
    }

    /// True when every one of `visible` is selected (and there is at least one).
    pub fn covers<'a, I>(&self, visible: I) -> bool
    where
        I: IntoIterator<Item = &'a RowKey>,
    {
        let mut any = false;
        for key in visible {
            any = true;
            if !self.keys.contains(key) {
                return false;
            }
        }
        any
    }
}
