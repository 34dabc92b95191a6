//! Ordered collection types for EDN maps and sets.
//!
//! EDN maps are unordered by definition, but this crate keeps insertion
//! order anyway: decoded entries appear in source order, which makes output
//! deterministic and tests readable. Both wrappers sit on `indexmap`.
//!
//! Keys are [`Value`]s, and every EDN value — collections included — is a
//! valid key; `Value`'s `Hash`/`Eq` impls take care of floats and nested
//! collections. Inserting a duplicate key replaces the previous entry.

use indexmap::{IndexMap, IndexSet};

use crate::value::Value;

/// An insertion-ordered map of EDN values to EDN values.
///
/// # Examples
///
/// ```rust
/// use serde_edn::{EdnMap, Value};
///
/// let mut map = EdnMap::new();
/// map.insert(Value::from("k"), Value::from(1));
/// assert_eq!(map.get(&Value::from("k")), Some(&Value::from(1)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdnMap(IndexMap<Value, Value>);

impl EdnMap {
    #[must_use]
    pub fn new() -> Self {
        EdnMap(IndexMap::new())
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        EdnMap(IndexMap::with_capacity(capacity))
    }

    /// Inserts a key-value pair, returning the previous value for the key if
    /// there was one.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        self.0.insert(key, value)
    }

    #[must_use]
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &Value) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, Value, Value> {
        self.0.keys()
    }

    pub fn values(&self) -> indexmap::map::Values<'_, Value, Value> {
        self.0.values()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, Value, Value> {
        self.0.iter()
    }
}

impl IntoIterator for EdnMap {
    type Item = (Value, Value);
    type IntoIter = indexmap::map::IntoIter<Value, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a EdnMap {
    type Item = (&'a Value, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, Value, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(Value, Value)> for EdnMap {
    fn from_iter<T: IntoIterator<Item = (Value, Value)>>(iter: T) -> Self {
        EdnMap(IndexMap::from_iter(iter))
    }
}

impl std::hash::Hash for EdnMap {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // order-insensitive: combine per-entry hashes commutatively
        let mut acc: u64 = 0;
        for (k, v) in &self.0 {
            let mut h = std::collections::hash_map::DefaultHasher::new();
            std::hash::Hash::hash(k, &mut h);
            std::hash::Hash::hash(v, &mut h);
            acc = acc.wrapping_add(std::hash::Hasher::finish(&h));
        }
        state.write_u64(acc);
        state.write_usize(self.0.len());
    }
}

/// An insertion-ordered set of EDN values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdnSet(IndexSet<Value>);

impl EdnSet {
    #[must_use]
    pub fn new() -> Self {
        EdnSet(IndexSet::new())
    }

    /// Inserts a value; returns `false` if it was already present.
    pub fn insert(&mut self, value: Value) -> bool {
        self.0.insert(value)
    }

    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        self.0.contains(value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> indexmap::set::Iter<'_, Value> {
        self.0.iter()
    }
}

impl IntoIterator for EdnSet {
    type Item = Value;
    type IntoIter = indexmap::set::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a EdnSet {
    type Item = &'a Value;
    type IntoIter = indexmap::set::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Value> for EdnSet {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        EdnSet(IndexSet::from_iter(iter))
    }
}

impl std::hash::Hash for EdnSet {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        let mut acc: u64 = 0;
        for v in &self.0 {
            let mut h = std::collections::hash_map::DefaultHasher::new();
            std::hash::Hash::hash(v, &mut h);
            acc = acc.wrapping_add(std::hash::Hasher::finish(&h));
        }
        state.write_u64(acc);
        state.write_usize(self.0.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_is_kept() {
        let mut map = EdnMap::new();
        map.insert(Value::from("b"), Value::from(2));
        map.insert(Value::from("a"), Value::from(1));
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec![Value::from("b"), Value::from("a")]);
    }

    #[test]
    fn duplicate_key_replaces() {
        let mut map = EdnMap::new();
        assert!(map.insert(Value::from("k"), Value::from(1)).is_none());
        assert!(map.insert(Value::from("k"), Value::from(2)).is_some());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn equal_maps_hash_equal_regardless_of_order() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut a = EdnMap::new();
        a.insert(Value::from(1), Value::from("x"));
        a.insert(Value::from(2), Value::from("y"));
        let mut b = EdnMap::new();
        b.insert(Value::from(2), Value::from("y"));
        b.insert(Value::from(1), Value::from("x"));

        let hash = |m: &EdnMap| {
            let mut h = DefaultHasher::new();
            m.hash(&mut h);
            h.finish()
        };
        assert_eq!(a, b);
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn nested_collections_as_set_elements() {
        let mut set = EdnSet::new();
        set.insert(Value::Set(EdnSet::new()));
        set.insert(Value::Set(EdnSet::new()));
        assert_eq!(set.len(), 1);
    }
}
