//! Backing containers for the two halves of a left-right map.

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

/// A mutable key to value container.
///
/// A left-right map owns two arenas. Readers only ever see one through a
/// shared reference while the writer mutates the other.
pub trait Arena<K, V> {
    /// Creates an empty arena with room for at least `capacity` entries.
    fn with_capacity(capacity: usize) -> Self
    where
        Self: Sized;

    /// Inserts a value, overwriting any previous value for the key.
    fn insert(&mut self, key: K, value: V);

    /// Removes a key. Does nothing if the key is absent.
    fn remove(&mut self, key: &K);

    /// Looks up a key.
    fn get(&self, key: &K) -> Option<&V>;

    /// Returns the number of entries.
    fn len(&self) -> usize;

    /// Returns true if the arena has no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits every entry in arena order.
    /// Returns early if the function returns false.
    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &V) -> bool;
}

impl<K, V, S> Arena<K, V> for HashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn with_capacity(capacity: usize) -> Self {
        HashMap::with_capacity_and_hasher(capacity, S::default())
    }

    #[inline]
    fn insert(&mut self, key: K, value: V) {
        HashMap::insert(self, key, value);
    }

    #[inline]
    fn remove(&mut self, key: &K) {
        HashMap::remove(self, key);
    }

    #[inline]
    fn get(&self, key: &K) -> Option<&V> {
        HashMap::get(self, key)
    }

    #[inline]
    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        for (key, value) in self.iter() {
            if !f(key, value) {
                return;
            }
        }
    }
}

impl<K, V> Arena<K, V> for BTreeMap<K, V>
where
    K: Ord,
{
    // B-trees allocate per node, there is nothing to reserve.
    fn with_capacity(_capacity: usize) -> Self {
        BTreeMap::new()
    }

    #[inline]
    fn insert(&mut self, key: K, value: V) {
        BTreeMap::insert(self, key, value);
    }

    #[inline]
    fn remove(&mut self, key: &K) {
        BTreeMap::remove(self, key);
    }

    #[inline]
    fn get(&self, key: &K) -> Option<&V> {
        BTreeMap::get(self, key)
    }

    #[inline]
    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        for (key, value) in self.iter() {
            if !f(key, value) {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise<A: Arena<u32, u32>>(mut arena: A) {
        assert!(arena.is_empty());

        arena.insert(1, 10);
        arena.insert(2, 20);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(&1), Some(&10));

        // Overwrite keeps a single entry
        arena.insert(1, 11);
        assert_eq!(arena.get(&1), Some(&11));
        assert_eq!(arena.len(), 2);

        arena.remove(&2);
        assert_eq!(arena.get(&2), None);
        assert_eq!(arena.len(), 1);

        // Removing an absent key is a no-op
        arena.remove(&99);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_hash_map_arena() {
        exercise(<HashMap<u32, u32> as Arena<u32, u32>>::with_capacity(16));
    }

    #[test]
    fn test_btree_map_arena() {
        exercise(<BTreeMap<u32, u32> as Arena<u32, u32>>::with_capacity(16));
    }

    #[test]
    fn test_for_each_visits_all() {
        let mut arena: HashMap<u32, u32> = HashMap::new();
        for i in 0..10u32 {
            arena.insert(i, i * 2);
        }

        let mut sum = 0;
        let mut visited = 0;
        <HashMap<u32, u32> as Arena<u32, u32>>::for_each(&arena, |_, v| {
            sum += *v;
            visited += 1;
            true
        });

        assert_eq!(visited, 10);
        assert_eq!(sum, 90);
    }

    #[test]
    fn test_for_each_stops_early() {
        let mut arena: BTreeMap<u32, u32> = BTreeMap::new();
        for i in 0..10u32 {
            arena.insert(i, i);
        }

        let mut seen = Vec::new();
        <BTreeMap<u32, u32> as Arena<u32, u32>>::for_each(&arena, |k, _| {
            seen.push(*k);
            seen.len() < 3
        });

        assert_eq!(seen, vec![0, 1, 2]);
    }
}
