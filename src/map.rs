//! Persistent map façade.

use std::fmt;
use std::ops;
use std::sync::Arc;

use crate::hash::TrieHash;
use crate::iter::{Iter, Keys, Values};
use crate::node::Node;
#[cfg(test)]
use crate::node::NodeKind;
use crate::ops::get::get_recursive;
use crate::ops::insert::{InsertOutcome, insert_recursive, leaf_node};
use crate::ops::remove::{RemoveOutcome, remove_recursive};

/// Persistent hash map over a hash-array-mapped trie.
///
/// Every update returns a new map; unchanged subtrees are shared between
/// the old and the new version, so a snapshot is one pointer copy and an
/// update rewrites only the root-to-leaf path it touches. Maps are
/// immutable after construction, which makes concurrent readers of one
/// map trivially safe.
pub struct HamtMap<K, V> {
    root: Option<Arc<Node<K, V>>>,
    size: usize,
}

// ---------------------------------------------------------------------------
// Construction & accessors — no trait bounds
// ---------------------------------------------------------------------------

impl<K, V> HamtMap<K, V> {
    /// Creates an empty map. Allocation-free.
    #[must_use]
    pub const fn new() -> Self {
        Self { root: None, size: 0 }
    }

    /// Returns the number of key-value pairs.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the map contains no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns an iterator over `(&K, &V)` pairs.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self.root.as_deref(), self.size)
    }

    /// Returns an iterator over the keys.
    #[must_use]
    pub fn keys(&self) -> Keys<'_, K, V> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over the values.
    #[must_use]
    pub fn values(&self) -> Values<'_, K, V> {
        self.iter().map(|(_, value)| value)
    }

    /// Variant of the root node, for structural assertions.
    #[cfg(test)]
    pub(crate) fn root_kind(&self) -> Option<NodeKind> {
        self.root.as_deref().map(Node::kind)
    }

    /// Root node access for structural assertions.
    #[cfg(test)]
    pub(crate) fn root_node(&self) -> Option<&Node<K, V>> {
        self.root.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Read operations — K: TrieHash
// ---------------------------------------------------------------------------

impl<K: TrieHash, V> HamtMap<K, V> {
    /// Returns a reference to the value associated with `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        let root = self.root.as_deref()?;
        get_recursive(root, 0, key.trie_hash(), key)
    }

    /// Returns `true` if the map contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }
}

// ---------------------------------------------------------------------------
// Write operations — K: TrieHash + Clone, V: Clone
// ---------------------------------------------------------------------------

impl<K: TrieHash + Clone, V: Clone> HamtMap<K, V> {
    /// Returns a new map with `key` bound to `value`.
    ///
    /// The length grows by one iff the key was not present; rebinding an
    /// existing key replaces its value. This map is unchanged.
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let hash = key.trie_hash();
        match &self.root {
            None => Self {
                root: Some(leaf_node(0, hash, key, value)),
                size: 1,
            },
            Some(root) => {
                let InsertOutcome { node, inserted } =
                    insert_recursive(root, 0, hash, key, value);
                Self {
                    root: Some(node),
                    size: self.size + usize::from(inserted),
                }
            }
        }
    }

    /// Returns a new map without `key`.
    ///
    /// Removing an absent key returns a map sharing this map's whole tree;
    /// removing the last entry returns the empty map. This map is
    /// unchanged.
    #[must_use]
    pub fn remove(&self, key: &K) -> Self {
        match &self.root {
            None => self.clone(),
            Some(root) => match remove_recursive(root, 0, key.trie_hash(), key) {
                RemoveOutcome::NotFound => self.clone(),
                RemoveOutcome::Removed { node } => Self {
                    root: node,
                    size: self.size - 1,
                },
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

impl<K, V> Clone for HamtMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            size: self.size,
        }
    }
}

impl<K, V> Default for HamtMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for HamtMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HamtMap")
            .field("len", &self.size)
            .finish_non_exhaustive()
    }
}

impl<K: TrieHash, V: PartialEq> PartialEq for HamtMap<K, V> {
    /// Two maps are equal iff they hold the same keys with equal values.
    ///
    /// Shared-root maps and length mismatches short-circuit before any
    /// per-key lookups.
    fn eq(&self, other: &Self) -> bool {
        if self.size != other.size {
            return false;
        }
        match (&self.root, &other.root) {
            (None, None) => true,
            (Some(a), Some(b)) if Arc::ptr_eq(a, b) => true,
            (Some(_), Some(_)) => self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|found| *value == *found)),
            // Equal sizes with only one empty root cannot happen.
            _ => false,
        }
    }
}

impl<K: TrieHash, V: Eq> Eq for HamtMap<K, V> {}

impl<K: TrieHash + Clone, V: Clone> Extend<(K, V)> for HamtMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            *self = self.insert(key, value);
        }
    }
}

impl<K: TrieHash + Clone, V: Clone> FromIterator<(K, V)> for HamtMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: TrieHash, V> ops::Index<&K> for HamtMap<K, V> {
    type Output = V;

    fn index(&self, key: &K) -> &V {
        self.get(key).expect("key not found")
    }
}

impl<'a, K, V> IntoIterator for &'a HamtMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}
