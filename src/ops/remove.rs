//! Removal — path-copying delete with demotion and leaf inlining.

use std::sync::Arc;

use crate::hash::TrieHash;
use crate::node::{self, ArrayNode, BitmapNode, CollisionNode, Node, Slot};

/// Outcome of a recursive remove.
pub(crate) enum RemoveOutcome<K, V> {
    /// Key was not found — the subtree is unchanged.
    NotFound,
    /// Key was removed; `None` means the subtree is now empty.
    Removed { node: Option<Arc<Node<K, V>>> },
}

/// Removes `key` from the subtree rooted at `current`, rewriting the path
/// down to the affected slot and sharing everything else.
pub(crate) fn remove_recursive<K, V>(
    current: &Node<K, V>,
    shift: u32,
    hash: i32,
    key: &K,
) -> RemoveOutcome<K, V>
where
    K: TrieHash + Clone,
    V: Clone,
{
    match current {
        Node::Bitmap(bitmap_node) => remove_from_bitmap(bitmap_node, shift, hash, key),
        Node::Array(array_node) => remove_from_array(array_node, shift, hash, key),
        Node::Collision(collision) => remove_from_collision(collision, shift, hash, key),
    }
}

// ---------------------------------------------------------------------------
// Bitmap node remove
// ---------------------------------------------------------------------------

fn remove_from_bitmap<K, V>(
    bitmap_node: &BitmapNode<K, V>,
    shift: u32,
    hash: i32,
    key: &K,
) -> RemoveOutcome<K, V>
where
    K: TrieHash + Clone,
    V: Clone,
{
    let bit = node::mask(node::fragment(hash, shift));
    if bitmap_node.bitmap & bit == 0 {
        return RemoveOutcome::NotFound;
    }
    let idx = node::index(bitmap_node.bitmap, bit);

    match &bitmap_node.slots[idx] {
        Slot::Child(child) => {
            match remove_recursive(child, shift + node::BITS_PER_LEVEL, hash, key) {
                RemoveOutcome::NotFound => RemoveOutcome::NotFound,
                RemoveOutcome::Removed { node: Some(sub) } => {
                    let mut slots = bitmap_node.slots.clone();
                    // A shrunken child holding a single leaf is pulled up
                    // into this node's slot.
                    slots[idx] = match sub.as_single_leaf() {
                        Some((k, v)) => Slot::Leaf(k.clone(), v.clone()),
                        None => Slot::Child(sub),
                    };
                    RemoveOutcome::Removed {
                        node: Some(Arc::new(Node::Bitmap(BitmapNode {
                            bitmap: bitmap_node.bitmap,
                            slots,
                        }))),
                    }
                }
                RemoveOutcome::Removed { node: None } => {
                    unreachable!("a bitmap child holds at least two entries")
                }
            }
        }
        Slot::Leaf(existing_key, _) => {
            if existing_key != key {
                return RemoveOutcome::NotFound;
            }
            if bitmap_node.slots.len() == 1 {
                return RemoveOutcome::Removed { node: None };
            }
            let mut slots = Vec::with_capacity(bitmap_node.slots.len() - 1);
            slots.extend(bitmap_node.slots[..idx].iter().cloned());
            slots.extend(bitmap_node.slots[idx + 1..].iter().cloned());
            RemoveOutcome::Removed {
                node: Some(Arc::new(Node::Bitmap(BitmapNode {
                    bitmap: bitmap_node.bitmap & !bit,
                    slots,
                }))),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Array node remove
// ---------------------------------------------------------------------------

fn remove_from_array<K, V>(
    array_node: &ArrayNode<K, V>,
    shift: u32,
    hash: i32,
    key: &K,
) -> RemoveOutcome<K, V>
where
    K: TrieHash + Clone,
    V: Clone,
{
    let frag = node::fragment(hash, shift) as usize;
    let Some(child) = &array_node.children[frag] else {
        return RemoveOutcome::NotFound;
    };

    match remove_recursive(child, shift + node::BITS_PER_LEVEL, hash, key) {
        RemoveOutcome::NotFound => RemoveOutcome::NotFound,
        RemoveOutcome::Removed { node: Some(sub) } => {
            let mut children = array_node.children.clone();
            children[frag] = Some(sub);
            RemoveOutcome::Removed {
                node: Some(Arc::new(Node::Array(ArrayNode {
                    count: array_node.count,
                    children,
                }))),
            }
        }
        RemoveOutcome::Removed { node: None } => {
            let remaining = array_node.count - 1;
            if remaining == 0 {
                return RemoveOutcome::Removed { node: None };
            }
            if usize::from(remaining) >= node::BITMAP_MAX_SLOTS {
                let mut children = array_node.children.clone();
                children[frag] = None;
                RemoveOutcome::Removed {
                    node: Some(Arc::new(Node::Array(ArrayNode { count: remaining, children }))),
                }
            } else {
                demote_to_bitmap(array_node, frag)
            }
        }
    }
}

/// Rebuilds an underpopulated array node as a bitmap node, inlining each
/// surviving one-leaf child as a direct leaf.
fn demote_to_bitmap<K, V>(array_node: &ArrayNode<K, V>, removed: usize) -> RemoveOutcome<K, V>
where
    K: Clone,
    V: Clone,
{
    let mut bitmap = 0;
    let mut slots = Vec::with_capacity(usize::from(array_node.count) - 1);

    for (position, child) in array_node.children.iter().enumerate() {
        if position == removed {
            continue;
        }
        if let Some(child) = child {
            #[allow(clippy::cast_possible_truncation)]
            {
                bitmap |= node::mask(position as u32);
            }
            slots.push(match child.as_single_leaf() {
                Some((k, v)) => Slot::Leaf(k.clone(), v.clone()),
                None => Slot::Child(Arc::clone(child)),
            });
        }
    }

    RemoveOutcome::Removed {
        node: Some(Arc::new(Node::Bitmap(BitmapNode { bitmap, slots }))),
    }
}

// ---------------------------------------------------------------------------
// Collision node remove
// ---------------------------------------------------------------------------

fn remove_from_collision<K, V>(
    collision: &CollisionNode<K, V>,
    shift: u32,
    hash: i32,
    key: &K,
) -> RemoveOutcome<K, V>
where
    K: TrieHash + Clone,
    V: Clone,
{
    if hash != collision.hash {
        return RemoveOutcome::NotFound;
    }
    let Some(pos) = collision.entries.iter().position(|(k, _)| k == key) else {
        return RemoveOutcome::NotFound;
    };

    if collision.entries.len() == 2 {
        // A collision node may not hold a single pair; demote the survivor
        // to a one-leaf bitmap at this level.
        let (k, v) = collision.entries[1 - pos].clone();
        RemoveOutcome::Removed {
            node: Some(Arc::new(Node::Bitmap(BitmapNode {
                bitmap: node::mask(node::fragment(collision.hash, shift)),
                slots: vec![Slot::Leaf(k, v)],
            }))),
        }
    } else {
        let mut entries = Vec::with_capacity(collision.entries.len() - 1);
        entries.extend(collision.entries[..pos].iter().cloned());
        entries.extend(collision.entries[pos + 1..].iter().cloned());
        RemoveOutcome::Removed {
            node: Some(Arc::new(Node::Collision(CollisionNode {
                hash: collision.hash,
                entries,
            }))),
        }
    }
}
