//! Trie node variants and bitmap helpers.

use std::sync::Arc;

/// Bits of the key hash consumed per trie level (5 → 32-way branching).
pub(crate) const BITS_PER_LEVEL: u32 = 5;

/// Deepest possible tree: seven branching levels for a 32-bit hash, plus a
/// collision leaf below the last one.
pub(crate) const MAX_TREE_DEPTH: usize = 8;

/// A bitmap node holding this many slots is promoted to an array node by
/// the next insert at a distinct position; an array node whose population
/// drops below this demotes back to a bitmap.
pub(crate) const BITMAP_MAX_SLOTS: usize = 16;

/// Trie node.
///
/// Three variants switched by load factor:
/// - [`Bitmap`](Self::Bitmap) — sparse branching, ≤ 16 occupied positions
/// - [`Array`](Self::Array) — dense branching, ≥ 16 children
/// - [`Collision`](Self::Collision) — ≥ 2 keys sharing one 32-bit hash
///
/// Nodes only ever live behind an `Arc`, so the size spread between the
/// variants stays off the stack.
#[derive(Clone)]
#[allow(clippy::large_enum_variant)]
pub(crate) enum Node<K, V> {
    Bitmap(BitmapNode<K, V>),
    Array(ArrayNode<K, V>),
    Collision(CollisionNode<K, V>),
}

/// Sparse branching node: bit `i` of `bitmap` marks position `i` occupied;
/// slots are stored densely in ascending bit order.
///
/// Invariant: `slots.len() == bitmap.count_ones()`.
#[derive(Clone)]
pub(crate) struct BitmapNode<K, V> {
    pub bitmap: u32,
    pub slots: Vec<Slot<K, V>>,
}

/// One occupied bitmap position: either a key/value leaf or a subtree.
#[derive(Clone)]
pub(crate) enum Slot<K, V> {
    Leaf(K, V),
    Child(Arc<Node<K, V>>),
}

/// Dense branching node indexed directly by hash fragment.
///
/// Invariant: `count` equals the number of `Some` children and never
/// drops below [`BITMAP_MAX_SLOTS`] (removals demote first).
#[derive(Clone)]
pub(crate) struct ArrayNode<K, V> {
    pub count: u8,
    pub children: [Option<Arc<Node<K, V>>>; 32],
}

/// Leaf container for two or more keys sharing the same 32-bit hash.
///
/// Invariant: `entries.len() >= 2`, all keys hashing to `hash`, pairwise
/// distinct.
#[derive(Clone)]
pub(crate) struct CollisionNode<K, V> {
    pub hash: i32,
    pub entries: Vec<(K, V)>,
}

/// Node variant discriminant, for structural assertions.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Bitmap,
    Array,
    Collision,
}

// ---------------------------------------------------------------------------
// Bit-index arithmetic
// ---------------------------------------------------------------------------

/// Extracts the 5-bit hash fragment at the given bit shift.
///
/// The hash is reinterpreted as unsigned so the shift never sign-extends.
#[inline]
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub(crate) const fn fragment(hash: i32, shift: u32) -> u32 {
    ((hash as u32) >> shift) & 0x1F
}

/// Returns the one-hot bit for the given fragment (0..31).
#[inline]
#[must_use]
pub(crate) const fn mask(frag: u32) -> u32 {
    1 << frag
}

/// Returns the dense slot index of `bit` within `bitmap`.
///
/// Counts the occupied positions below `bit`.
#[inline]
#[must_use]
pub(crate) const fn index(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

// ---------------------------------------------------------------------------
// Node accessors
// ---------------------------------------------------------------------------

impl<K, V> Node<K, V> {
    /// Returns this node's variant discriminant.
    #[cfg(test)]
    #[must_use]
    pub(crate) const fn kind(&self) -> NodeKind {
        match self {
            Self::Bitmap(_) => NodeKind::Bitmap,
            Self::Array(_) => NodeKind::Array,
            Self::Collision(_) => NodeKind::Collision,
        }
    }

    /// Returns the pair if this is a bitmap node holding exactly one leaf.
    ///
    /// Such a node may never hang below a bitmap node; removals use this
    /// accessor to inline the pair into the parent instead.
    #[must_use]
    pub(crate) fn as_single_leaf(&self) -> Option<(&K, &V)> {
        match self {
            Self::Bitmap(bitmap_node) => match bitmap_node.slots.as_slice() {
                [Slot::Leaf(key, value)] => Some((key, value)),
                _ => None,
            },
            Self::Array(_) | Self::Collision(_) => None,
        }
    }
}
