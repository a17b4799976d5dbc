use std::collections::HashSet;

use crate::hash::TrieHash;
use crate::HamtMap;

#[test]
fn empty_iteration() {
    let map: HamtMap<i32, i32> = HamtMap::new();
    assert_eq!(map.iter().next(), None);
}

#[test]
fn single_entry() {
    let map = HamtMap::new().insert("k", 7);
    let items: Vec<_> = map.iter().collect();
    assert_eq!(items, vec![(&"k", &7)]);
}

/// Iteration yields exactly `len` items, each key exactly once.
#[test]
fn visits_each_entry_once() {
    let mut map = HamtMap::new();
    for i in 0_u64..500 {
        map = map.insert(i, i * 2);
    }

    let mut seen = HashSet::new();
    let mut count = 0;
    for (key, value) in &map {
        assert_eq!(*value, key * 2);
        assert!(seen.insert(*key), "key {key} yielded twice");
        count += 1;
    }
    assert_eq!(count, map.len());
}

#[test]
fn keys_projection() {
    let map = HamtMap::new().insert(1, "a").insert(2, "b").insert(3, "c");
    let keys: HashSet<i32> = map.keys().copied().collect();
    assert_eq!(keys, HashSet::from([1, 2, 3]));
}

#[test]
fn values_projection() {
    let map = HamtMap::new().insert(1, 10).insert(2, 20);
    let mut values: Vec<i32> = map.values().copied().collect();
    values.sort_unstable();
    assert_eq!(values, vec![10, 20]);
}

/// The iterator knows its exact length up front.
#[test]
fn exact_size() {
    let mut map = HamtMap::new();
    for i in 0..37 {
        map = map.insert(i, ());
    }

    let mut iter = map.iter();
    assert_eq!(iter.len(), 37);
    assert_eq!(iter.size_hint(), (37, Some(37)));
    iter.next();
    assert_eq!(iter.len(), 36);
}

/// Collision entries are all visited.
#[test]
fn iterates_collisions() {
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Forced(u32);
    impl TrieHash for Forced {
        fn trie_hash(&self) -> i32 {
            0x0BAD
        }
    }

    let mut map = HamtMap::new();
    for id in 0..5 {
        map = map.insert(Forced(id), id);
    }

    let seen: HashSet<u32> = map.iter().map(|(k, _)| k.0).collect();
    assert_eq!(seen.len(), 5);
    assert_eq!(map.iter().count(), 5);
}

/// Deep chains and a promoted root iterate completely.
#[test]
fn iterates_mixed_shapes() {
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Shaped(i32);
    impl TrieHash for Shaped {
        fn trie_hash(&self) -> i32 {
            self.0
        }
    }

    let mut map = HamtMap::new();
    // 17 distinct root positions → array root.
    for i in 0..17 {
        map = map.insert(Shaped(i), i);
    }
    // Two keys diverging only at the top of the hash → deep chain.
    map = map.insert(Shaped(1 << 30), -1).insert(Shaped(1 << 29), -2);

    let seen: HashSet<i32> = map.iter().map(|(k, _)| k.0).collect();
    assert_eq!(seen.len(), 19);
    assert_eq!(map.iter().count(), map.len());
}
