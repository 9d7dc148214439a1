//! First-wins merge of values arriving in batches.

use std::collections::HashSet;
use std::hash::Hash;

/// Ordered collection that keeps only the first value seen for each key.
#[derive(Debug, Clone)]
pub struct KeyedMerge<K, T> {
    seen: HashSet<K>,
    items: Vec<T>,
}

impl<K: Eq + Hash, T> Default for KeyedMerge<K, T> {
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
            items: Vec::new(),
        }
    }
}

impl<K: Eq + Hash, T> KeyedMerge<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `item` unless its key was already seen. Returns whether it was kept.
    pub fn insert(&mut self, key: K, item: T) -> bool {
        if self.seen.insert(key) {
            self.items.push(item);
            true
        } else {
            false
        }
    }

    /// Fold a batch in, returning how many values were new.
    pub fn extend_by<I, F>(&mut self, batch: I, key: F) -> usize
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> K,
    {
        let mut added = 0;
        for item in batch {
            if self.insert(key(&item), item) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::ExtractedItem;

    fn item(lot: &str, number: &str, description: &str, unit: &str) -> ExtractedItem {
        ExtractedItem {
            lot_number: Some(lot.to_string()),
            item_number: Some(number.to_string()),
            description: Some(description.to_string()),
            unit: Some(unit.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_overlapping_windows_keep_first_occurrence() {
        let window_one = vec![item("1", "1", "Cadeira", "UN"), item("1", "2", "Mesa", "UN")];
        let window_two = vec![item("1", "2", "Mesa", "CJ")];

        let mut merged = KeyedMerge::new();
        assert_eq!(merged.extend_by(window_one, ExtractedItem::identity_key), 2);
        assert_eq!(merged.extend_by(window_two, ExtractedItem::identity_key), 0);

        assert_eq!(merged.len(), 2);
        let mesa = &merged.items()[1];
        assert_eq!(mesa.unit.as_deref(), Some("UN"));
    }

    #[test]
    fn test_merging_same_batch_twice_is_idempotent() {
        let batch = vec![item("", "1", "Armário", "UN"), item("", "2", "Estante", "UN")];

        let mut once = KeyedMerge::new();
        once.extend_by(batch.clone(), ExtractedItem::identity_key);

        let mut twice = KeyedMerge::new();
        twice.extend_by(batch.clone(), ExtractedItem::identity_key);
        twice.extend_by(batch, ExtractedItem::identity_key);

        assert_eq!(once.into_items(), twice.into_items());
    }

    #[test]
    fn test_insertion_order_is_preserved() {
        let mut merged = KeyedMerge::new();
        for (key, value) in [(3, "c"), (1, "a"), (3, "x"), (2, "b")] {
            merged.insert(key, value);
        }
        assert_eq!(merged.items(), &["c", "a", "b"]);
        assert!(!merged.is_empty());
    }
}
