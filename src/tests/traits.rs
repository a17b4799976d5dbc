use crate::HamtMap;

#[test]
fn default_is_empty() {
    let map: HamtMap<i32, i32> = HamtMap::default();
    assert!(map.is_empty());
}

#[test]
fn debug_format() {
    let map: HamtMap<i32, i32> = HamtMap::new();
    let dbg = format!("{map:?}");
    assert!(dbg.contains("HamtMap"));
    assert!(dbg.contains("len"));
}

#[test]
fn from_iterator() {
    let map: HamtMap<i32, i32> = vec![(1, 10), (2, 20), (3, 30)].into_iter().collect();
    assert_eq!(map.len(), 3);
    assert_eq!(map.get(&1), Some(&10));
}

#[test]
fn from_iterator_last_binding_wins() {
    let map: HamtMap<i32, &str> = vec![(1, "old"), (1, "new")].into_iter().collect();
    assert_eq!(map.len(), 1);
    assert_eq!(map.get(&1), Some(&"new"));
}

#[test]
fn extend_trait() {
    let mut map = HamtMap::new().insert(1, 10);
    map.extend(vec![(2, 20), (3, 30)]);
    assert_eq!(map.len(), 3);
}

#[test]
fn clone_is_cheap_alias() {
    let map = HamtMap::new().insert("k", 1);
    let cloned = map.clone();
    assert_eq!(cloned, map);
    assert_eq!(cloned.get(&"k"), Some(&1));
}

#[test]
fn index_existing() {
    let map = HamtMap::new().insert("key", 42);
    assert_eq!(map[&"key"], 42);
}

#[test]
#[should_panic(expected = "key not found")]
fn index_missing_panics() {
    let map: HamtMap<i32, i32> = HamtMap::new();
    let _ = map[&999];
}

#[test]
fn into_iterator_for_ref() {
    let map = HamtMap::new().insert(1, 2);
    let mut total = 0;
    for (key, value) in &map {
        total += key + value;
    }
    assert_eq!(total, 3);
}
