//! Concurrent map keyed by an outer key, then an inner key.
//!
//! Every outer bucket holds at least one entry: buckets are created on the
//! first `set` and dropped as soon as `delete_inner` empties them. One
//! read-write lock covers the whole structure.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
pub struct TwoLevelMap<K1, K2, V> {
    inner: RwLock<HashMap<K1, HashMap<K2, V>>>,
}

impl<K1, K2, V> TwoLevelMap<K1, K2, V>
where
    K1: Eq + Hash,
    K2: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite the value at (`k1`, `k2`)
    pub fn set(&self, k1: K1, k2: K2, value: V) {
        self.inner.write().entry(k1).or_default().insert(k2, value);
    }

    pub fn get(&self, k1: &K1, k2: &K2) -> Option<V>
    where
        V: Clone,
    {
        self.inner.read().get(k1)?.get(k2).cloned()
    }

    /// Remove one inner entry, dropping the outer bucket if it becomes empty
    pub fn delete_inner(&self, k1: &K1, k2: &K2) -> Option<V> {
        let mut map = self.inner.write();
        let bucket = map.get_mut(k1)?;
        let removed = bucket.remove(k2);
        if bucket.is_empty() {
            map.remove(k1);
        }
        removed
    }

    /// Remove an outer bucket with all of its entries
    pub fn delete(&self, k1: &K1) -> Option<HashMap<K2, V>> {
        self.inner.write().remove(k1)
    }

    pub fn contains_outer(&self, k1: &K1) -> bool {
        self.inner.read().contains_key(k1)
    }

    /// Number of entries under `k1`
    pub fn inner_len(&self, k1: &K1) -> usize {
        self.inner.read().get(k1).map_or(0, HashMap::len)
    }

    /// Number of outer buckets
    pub fn outer_len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Point-in-time copy of the whole map
    pub fn snapshot(&self) -> HashMap<K1, HashMap<K2, V>>
    where
        K1: Clone,
        K2: Clone,
        V: Clone,
    {
        self.inner.read().clone()
    }

    /// Run `visit` against the map while holding the shared lock.
    ///
    /// `visit` must not call back into this map for writing.
    pub fn with_read<R>(&self, visit: impl FnOnce(&HashMap<K1, HashMap<K2, V>>) -> R) -> R {
        visit(&self.inner.read())
    }
}

impl<K1, K2, V> Default for TwoLevelMap<K1, K2, V>
where
    K1: Eq + Hash,
    K2: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_and_get() {
        let map = TwoLevelMap::new();
        map.set("a", 1, "one");
        map.set("a", 2, "two");
        map.set("b", 1, "uno");

        assert_eq!(map.get(&"a", &1), Some("one"));
        assert_eq!(map.get(&"a", &2), Some("two"));
        assert_eq!(map.get(&"b", &1), Some("uno"));
        assert_eq!(map.get(&"b", &2), None);
        assert_eq!(map.get(&"c", &1), None);
        assert_eq!(map.outer_len(), 2);
    }

    #[test]
    fn test_set_overwrites() {
        let map = TwoLevelMap::new();
        map.set("a", 1, 10);
        map.set("a", 1, 11);
        assert_eq!(map.get(&"a", &1), Some(11));
        assert_eq!(map.inner_len(&"a"), 1);
    }

    #[test]
    fn test_delete_inner_drops_empty_bucket() {
        let map = TwoLevelMap::new();
        map.set("a", "b", 1);
        assert_eq!(map.delete_inner(&"a", &"b"), Some(1));
        assert!(!map.contains_outer(&"a"));
        assert!(map.is_empty());
    }

    #[test]
    fn test_delete_inner_keeps_non_empty_bucket() {
        let map = TwoLevelMap::new();
        map.set("a", "b", 1);
        map.set("a", "c", 2);
        map.delete_inner(&"a", &"b");
        assert!(map.contains_outer(&"a"));
        assert_eq!(map.inner_len(&"a"), 1);
    }

    #[test]
    fn test_delete_inner_missing_is_noop() {
        let map: TwoLevelMap<&str, &str, i32> = TwoLevelMap::new();
        assert_eq!(map.delete_inner(&"a", &"b"), None);

        map.set("a", "b", 1);
        assert_eq!(map.delete_inner(&"a", &"zzz"), None);
        assert!(map.contains_outer(&"a"));
    }

    #[test]
    fn test_delete_removes_bucket() {
        let map = TwoLevelMap::new();
        map.set("a", 1, ());
        map.set("a", 2, ());
        map.set("b", 1, ());

        let removed = map.delete(&"a").unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!map.contains_outer(&"a"));
        assert!(map.contains_outer(&"b"));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let map = TwoLevelMap::new();
        map.set("a".to_string(), 1, 1);
        let snap = map.snapshot();
        map.set("a".to_string(), 2, 2);

        assert_eq!(snap["a"].len(), 1);
        assert_eq!(map.inner_len(&"a".to_string()), 2);
    }

    #[test]
    fn test_with_read_visits_all_entries() {
        let map = TwoLevelMap::new();
        map.set(1, 1, 5);
        map.set(1, 2, 5);
        map.set(2, 1, 5);

        let total: i32 = map.with_read(|m| m.values().flat_map(|b| b.values()).sum());
        assert_eq!(total, 15);
    }

    #[test]
    fn test_concurrent_churn_leaves_no_buckets() {
        let map = Arc::new(TwoLevelMap::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let map = Arc::clone(&map);
                thread::spawn(move || {
                    for i in 0..200 {
                        map.set(t % 3, (t, i), i);
                        map.delete_inner(&(t % 3), &(t, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(map.is_empty());
    }
}
