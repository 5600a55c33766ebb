//! Hash collections with the hashers the workspace settles on.
//!
//! `HashMap`/`HashSet` use `ahash`, which is fast and DoS-resistant enough for
//! catalog-sized maps. `IntMap`/`IntSet` skip hashing entirely and are meant for
//! keys that are already well-distributed integers, such as the id newtypes.

use core::hash::{BuildHasher, BuildHasherDefault, Hash};
use nohash_hasher::BuildNoHashHasher;

pub use hashbrown::hash_map::Entry;
pub use nohash_hasher::IsEnabled as ValidAsIdentityHash;

/// `ahash` with fixed keys, so the builder is `Default` without runtime randomness.
pub type DefaultHashBuilder = BuildHasherDefault<ahash::AHasher>;

pub type HashMap<K, V, S = DefaultHashBuilder> = hashbrown::HashMap<K, V, S>;

pub type HashSet<T, S = DefaultHashBuilder> = hashbrown::HashSet<T, S>;

/// A map keyed by integers which are used as their own hash.
pub type IntMap<K, V> = hashbrown::HashMap<K, V, BuildNoHashHasher<K>>;

/// A set of integers which are used as their own hash.
pub type IntSet<K> = hashbrown::HashSet<K, BuildNoHashHasher<K>>;

/// `new` and `with_capacity` for every hash collection, regardless of its hasher.
///
/// `hashbrown` only provides these for its own default hasher.
pub trait HashCollectionExt {
    fn new() -> Self;

    fn with_capacity(capacity: usize) -> Self;
}

impl<K, V, S: BuildHasher + Default> HashCollectionExt for hashbrown::HashMap<K, V, S> {
    fn new() -> Self {
        Self::with_hasher(S::default())
    }

    fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<T: Hash + Eq, S: BuildHasher + Default> HashCollectionExt for hashbrown::HashSet<T, S> {
    fn new() -> Self {
        Self::with_hasher(S::default())
    }

    fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_map_round_trips() {
        let mut map: IntMap<u32, &str> = IntMap::new();
        map.insert(3, "three");
        map.insert(1, "one");
        assert_eq!(map.get(&3), Some(&"three"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn default_hasher_builds_maps() {
        let mut map: HashMap<Box<str>, u32> = HashMap::new();
        map.insert("ID".into(), 0);
        assert_eq!(map.get("ID"), Some(&0));
        // Fixed keys: two builders hash alike.
        assert_eq!(
            DefaultHashBuilder::default().hash_one("ID"),
            DefaultHashBuilder::default().hash_one("ID")
        );
    }

    #[test]
    fn hash_set_with_capacity_starts_empty() {
        let set: HashSet<String> = HashSet::with_capacity(16);
        assert!(set.is_empty());
        assert!(set.capacity() >= 16);
    }
}
