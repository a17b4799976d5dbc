//! Insertion — path-copying assoc over shared nodes.

use std::sync::Arc;

use crate::hash::TrieHash;
use crate::node::{self, ArrayNode, BitmapNode, CollisionNode, Node, Slot};

/// Outcome of a recursive insert.
pub(crate) struct InsertOutcome<K, V> {
    /// Root of the rewritten subtree.
    pub node: Arc<Node<K, V>>,
    /// `true` if a new key was added, `false` if an existing value was
    /// replaced.
    pub inserted: bool,
}

/// Inserts `key`/`value` into the subtree rooted at `current`, rewriting
/// the path down to the affected slot and sharing everything else.
pub(crate) fn insert_recursive<K, V>(
    current: &Node<K, V>,
    shift: u32,
    hash: i32,
    key: K,
    value: V,
) -> InsertOutcome<K, V>
where
    K: TrieHash + Clone,
    V: Clone,
{
    match current {
        Node::Bitmap(bitmap_node) => insert_into_bitmap(bitmap_node, shift, hash, key, value),
        Node::Array(array_node) => insert_into_array(array_node, shift, hash, key, value),
        Node::Collision(collision) => insert_into_collision(collision, shift, hash, key, value),
    }
}

/// Builds the one-leaf bitmap node that starts a fresh subtree.
pub(crate) fn leaf_node<K, V>(shift: u32, hash: i32, key: K, value: V) -> Arc<Node<K, V>> {
    Arc::new(Node::Bitmap(BitmapNode {
        bitmap: node::mask(node::fragment(hash, shift)),
        slots: vec![Slot::Leaf(key, value)],
    }))
}

// ---------------------------------------------------------------------------
// Bitmap node insert
// ---------------------------------------------------------------------------

fn insert_into_bitmap<K, V>(
    bitmap_node: &BitmapNode<K, V>,
    shift: u32,
    hash: i32,
    key: K,
    value: V,
) -> InsertOutcome<K, V>
where
    K: TrieHash + Clone,
    V: Clone,
{
    let bit = node::mask(node::fragment(hash, shift));
    let idx = node::index(bitmap_node.bitmap, bit);

    if bitmap_node.bitmap & bit != 0 {
        match &bitmap_node.slots[idx] {
            Slot::Child(child) => {
                let outcome =
                    insert_recursive(child, shift + node::BITS_PER_LEVEL, hash, key, value);
                let mut slots = bitmap_node.slots.clone();
                slots[idx] = Slot::Child(outcome.node);
                InsertOutcome {
                    node: Arc::new(Node::Bitmap(BitmapNode { bitmap: bitmap_node.bitmap, slots })),
                    inserted: outcome.inserted,
                }
            }
            Slot::Leaf(existing_key, existing_value) => {
                if *existing_key == key {
                    // Same key → replace the value.
                    let mut slots = bitmap_node.slots.clone();
                    slots[idx] = Slot::Leaf(key, value);
                    InsertOutcome {
                        node: Arc::new(Node::Bitmap(BitmapNode {
                            bitmap: bitmap_node.bitmap,
                            slots,
                        })),
                        inserted: false,
                    }
                } else {
                    // Two distinct keys in one position → push both one
                    // level down.
                    let subtree = join_entries(
                        shift + node::BITS_PER_LEVEL,
                        existing_key.trie_hash(),
                        existing_key.clone(),
                        existing_value.clone(),
                        hash,
                        key,
                        value,
                    );
                    let mut slots = bitmap_node.slots.clone();
                    slots[idx] = Slot::Child(subtree);
                    InsertOutcome {
                        node: Arc::new(Node::Bitmap(BitmapNode {
                            bitmap: bitmap_node.bitmap,
                            slots,
                        })),
                        inserted: true,
                    }
                }
            }
        }
    } else if bitmap_node.slots.len() >= node::BITMAP_MAX_SLOTS {
        promote_to_array(bitmap_node, shift, hash, key, value)
    } else {
        let mut slots = Vec::with_capacity(bitmap_node.slots.len() + 1);
        slots.extend(bitmap_node.slots[..idx].iter().cloned());
        slots.push(Slot::Leaf(key, value));
        slots.extend(bitmap_node.slots[idx..].iter().cloned());
        InsertOutcome {
            node: Arc::new(Node::Bitmap(BitmapNode { bitmap: bitmap_node.bitmap | bit, slots })),
            inserted: true,
        }
    }
}

/// Spreads a full bitmap node into a 32-way array node, placing each
/// existing slot at the position its own hash fragment selects, then adds
/// the new pair.
fn promote_to_array<K, V>(
    bitmap_node: &BitmapNode<K, V>,
    shift: u32,
    hash: i32,
    key: K,
    value: V,
) -> InsertOutcome<K, V>
where
    K: TrieHash + Clone,
    V: Clone,
{
    let mut children: [Option<Arc<Node<K, V>>>; 32] = [const { None }; 32];
    let mut slot_idx = 0;

    for position in 0..32 {
        if bitmap_node.bitmap & node::mask(position) != 0 {
            children[position as usize] = Some(match &bitmap_node.slots[slot_idx] {
                Slot::Child(child) => Arc::clone(child),
                Slot::Leaf(k, v) => leaf_node(
                    shift + node::BITS_PER_LEVEL,
                    k.trie_hash(),
                    k.clone(),
                    v.clone(),
                ),
            });
            slot_idx += 1;
        }
    }

    let frag = node::fragment(hash, shift) as usize;
    children[frag] = Some(leaf_node(shift + node::BITS_PER_LEVEL, hash, key, value));

    #[allow(clippy::cast_possible_truncation)]
    let count = bitmap_node.slots.len() as u8 + 1;
    InsertOutcome {
        node: Arc::new(Node::Array(ArrayNode { count, children })),
        inserted: true,
    }
}

/// Builds a fresh subtree holding two entries that clash at the previous
/// level.
///
/// Equal 32-bit hashes make a collision node; otherwise the recursion
/// descends until the hash fragments diverge, which is guaranteed within
/// the 32 bits.
fn join_entries<K, V>(
    shift: u32,
    first_hash: i32,
    first_key: K,
    first_value: V,
    second_hash: i32,
    second_key: K,
    second_value: V,
) -> Arc<Node<K, V>> {
    if first_hash == second_hash {
        return Arc::new(Node::Collision(CollisionNode {
            hash: first_hash,
            entries: vec![(first_key, first_value), (second_key, second_value)],
        }));
    }

    let first_frag = node::fragment(first_hash, shift);
    let second_frag = node::fragment(second_hash, shift);

    if first_frag == second_frag {
        let child = join_entries(
            shift + node::BITS_PER_LEVEL,
            first_hash,
            first_key,
            first_value,
            second_hash,
            second_key,
            second_value,
        );
        Arc::new(Node::Bitmap(BitmapNode {
            bitmap: node::mask(first_frag),
            slots: vec![Slot::Child(child)],
        }))
    } else {
        let slots = if first_frag < second_frag {
            vec![
                Slot::Leaf(first_key, first_value),
                Slot::Leaf(second_key, second_value),
            ]
        } else {
            vec![
                Slot::Leaf(second_key, second_value),
                Slot::Leaf(first_key, first_value),
            ]
        };
        Arc::new(Node::Bitmap(BitmapNode {
            bitmap: node::mask(first_frag) | node::mask(second_frag),
            slots,
        }))
    }
}

// ---------------------------------------------------------------------------
// Array node insert
// ---------------------------------------------------------------------------

fn insert_into_array<K, V>(
    array_node: &ArrayNode<K, V>,
    shift: u32,
    hash: i32,
    key: K,
    value: V,
) -> InsertOutcome<K, V>
where
    K: TrieHash + Clone,
    V: Clone,
{
    let frag = node::fragment(hash, shift) as usize;

    match &array_node.children[frag] {
        Some(child) => {
            let outcome = insert_recursive(child, shift + node::BITS_PER_LEVEL, hash, key, value);
            let mut children = array_node.children.clone();
            children[frag] = Some(outcome.node);
            InsertOutcome {
                node: Arc::new(Node::Array(ArrayNode { count: array_node.count, children })),
                inserted: outcome.inserted,
            }
        }
        None => {
            let mut children = array_node.children.clone();
            children[frag] = Some(leaf_node(shift + node::BITS_PER_LEVEL, hash, key, value));
            InsertOutcome {
                node: Arc::new(Node::Array(ArrayNode {
                    count: array_node.count + 1,
                    children,
                })),
                inserted: true,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Collision node insert
// ---------------------------------------------------------------------------

fn insert_into_collision<K, V>(
    collision: &CollisionNode<K, V>,
    shift: u32,
    hash: i32,
    key: K,
    value: V,
) -> InsertOutcome<K, V>
where
    K: TrieHash + Clone,
    V: Clone,
{
    if hash == collision.hash {
        if let Some(pos) = collision.entries.iter().position(|(k, _)| *k == key) {
            let mut entries = collision.entries.clone();
            entries[pos] = (key, value);
            InsertOutcome {
                node: Arc::new(Node::Collision(CollisionNode { hash: collision.hash, entries })),
                inserted: false,
            }
        } else {
            let mut entries = Vec::with_capacity(collision.entries.len() + 1);
            entries.extend(collision.entries.iter().cloned());
            entries.push((key, value));
            InsertOutcome {
                node: Arc::new(Node::Collision(CollisionNode { hash: collision.hash, entries })),
                inserted: true,
            }
        }
    } else {
        // The new key's hash diverges from this collision chain: lift the
        // chain into a one-child bitmap at this level and re-dispatch.
        let wrapper = BitmapNode {
            bitmap: node::mask(node::fragment(collision.hash, shift)),
            slots: vec![Slot::Child(Arc::new(Node::Collision(collision.clone())))],
        };
        insert_into_bitmap(&wrapper, shift, hash, key, value)
    }
}
