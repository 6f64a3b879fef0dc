//! The metadata store: string keys to string values.
//!
//! Both the session's public attributes and each member's declared data
//! live in a [`MetadataStore`]. The store is deliberately dumb: it never
//! validates content and has no listeners. Change detection happens one
//! level up, by comparing what the store held before a refresh with what
//! it holds after ([`MetadataStore::replace_all`] returns the difference).

use std::collections::BTreeMap;

/// An ordered map of metadata keys to values.
///
/// Keys are unique and last-write-wins. Iteration order is the keys'
/// lexical order, which is stable across calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataStore {
    records: BTreeMap<String, String>,
}

impl MetadataStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up one value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.records.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Writes one value. Returns `true` if the stored value changed.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let value = value.into();
        match self.records.insert(key.into(), value.clone()) {
            Some(previous) => previous != value,
            None => true,
        }
    }

    /// Removes one key, returning its old value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.records.remove(key)
    }

    /// Iterates `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Keys whose value differs between `self` and `other`, including keys
    /// present on only one side. Sorted.
    pub fn diff(&self, other: &MetadataStore) -> Vec<String> {
        let mut changed: Vec<String> = self
            .records
            .iter()
            .filter(|(k, v)| other.records.get(*k) != Some(*v))
            .map(|(k, _)| k.clone())
            .collect();
        changed.extend(
            other
                .records
                .keys()
                .filter(|k| !self.records.contains_key(*k))
                .cloned(),
        );
        changed.sort();
        changed
    }

    /// Replaces the whole contents with `pairs` and returns the keys that
    /// changed as a result.
    pub fn replace_all<I, K, V>(&mut self, pairs: I) -> Vec<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fresh = pairs.into_iter().collect::<MetadataStore>();
        let changed = self.diff(&fresh);
        *self = fresh;
        changed
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetadataStore {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            records: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_reports_whether_value_changed() {
        let mut store = MetadataStore::new();
        assert!(store.set("mode", "coop"));
        assert!(!store.set("mode", "coop"));
        assert!(store.set("mode", "versus"));
        assert_eq!(store.get("mode"), Some("versus"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_iter_is_key_ordered() {
        let store: MetadataStore =
            [("b", "2"), ("a", "1"), ("c", "3")].into_iter().collect();
        let keys: Vec<&str> = store.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_diff_reports_added_removed_and_changed() {
        let before: MetadataStore =
            [("keep", "1"), ("change", "a"), ("drop", "x")].into_iter().collect();
        let after: MetadataStore =
            [("keep", "1"), ("change", "b"), ("add", "y")].into_iter().collect();

        assert_eq!(before.diff(&after), vec!["add", "change", "drop"]);
    }

    #[test]
    fn test_replace_all_returns_changed_keys() {
        let mut store: MetadataStore = [("name", "Foo")].into_iter().collect();

        let changed = store.replace_all([("name", "Foo"), ("mode", "coop")]);

        assert_eq!(changed, vec!["mode"]);
        assert_eq!(store.get("name"), Some("Foo"));
    }

    #[test]
    fn test_replace_all_with_same_contents_changes_nothing() {
        let mut store: MetadataStore = [("name", "Foo")].into_iter().collect();
        assert!(store.replace_all([("name", "Foo")]).is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut store: MetadataStore = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(store.remove("a").as_deref(), Some("1"));
        assert!(!store.contains_key("a"));
        store.clear();
        assert!(store.is_empty());
    }
}
