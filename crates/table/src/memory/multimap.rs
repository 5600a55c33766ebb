use smallvec::SmallVec;
use std::collections::BTreeMap;

/// A multi map that relates a `K` to a *set* of `V`s.
#[derive(Debug)]
pub struct MultiMap<K, V> {
    /// The map is backed by a `BTreeMap` for relating keys to values.
    ///
    /// A value set is stored as a `SmallVec`,
    /// which keeps the common case of one value per key inline.
    map: BTreeMap<K, SmallVec<[V; 1]>>,
}

impl<K, V> Default for MultiMap<K, V> {
    fn default() -> Self {
        Self { map: BTreeMap::new() }
    }
}

impl<K: Ord, V: Ord> MultiMap<K, V> {
    /// Returns an empty multi map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the relation `key -> val` to this multimap.
    ///
    /// The map does not check whether `key -> val` was already in the map.
    pub fn insert(&mut self, key: K, val: V) {
        self.map.entry(key).or_default().push(val);
    }

    /// Inserts the relation `key -> val` to this multimap.
    ///
    /// Returns back the value already related to `key`, if any,
    /// in which case nothing is inserted.
    pub fn insert_unique(&mut self, key: K, val: V) -> Option<&V> {
        let vals = self.map.entry(key).or_default();
        if vals.is_empty() {
            vals.push(val);
            None
        } else {
            Some(&vals[0])
        }
    }

    /// Deletes `key -> val` from this multimap.
    ///
    /// Returns whether `key -> val` was present.
    pub fn delete(&mut self, key: &K, val: &V) -> bool {
        let Some(vset) = self.map.get_mut(key) else {
            return false;
        };
        // The `vset` is not sorted, so we have to do a linear scan first.
        let Some(idx) = vset.iter().position(|v| v == val) else {
            return false;
        };
        vset.swap_remove(idx);
        if vset.is_empty() {
            self.map.remove(key);
        }
        true
    }

    /// Returns an iterator over all `(K, V)` relations, in key order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &V)> + '_ {
        self.map.iter().flat_map(|(k, vs)| vs.iter().map(move |v| (k, v)))
    }

    /// Returns the number of unique keys in the multimap.
    pub fn num_keys(&self) -> usize {
        self.map.len()
    }

    /// Returns the total number of entries in the multimap.
    pub fn len(&self) -> usize {
        self.map.values().map(|vs| vs.len()).sum()
    }

    /// Returns whether there are any entries in the multimap.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Deletes all entries from the multimap, leaving it empty.
    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_insert_reports_existing() {
        let mut map = MultiMap::new();
        assert_eq!(map.insert_unique(1, 'a'), None);
        assert_eq!(map.insert_unique(1, 'b'), Some(&'a'));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn delete_drops_empty_keys() {
        let mut map = MultiMap::new();
        map.insert(1, 'a');
        map.insert(1, 'b');
        map.insert(2, 'c');
        assert!(map.delete(&1, &'a'));
        assert!(!map.delete(&1, &'a'));
        assert_eq!(map.num_keys(), 2);
        assert!(map.delete(&1, &'b'));
        assert_eq!(map.num_keys(), 1);
    }

    #[test]
    fn iter_yields_relations_in_key_order() {
        let mut map = MultiMap::new();
        for (k, v) in [(3, 'c'), (1, 'a'), (2, 'b'), (5, 'e')] {
            map.insert(k, v);
        }
        let keys: Vec<_> = map.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, [1, 2, 3, 5]);
        let last = map.iter().next_back().map(|(k, v)| (*k, *v));
        assert_eq!(last, Some((5, 'e')));
    }
}
