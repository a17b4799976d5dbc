//! Lookup — walks the trie by hash fragments to find a key.

use crate::hash::TrieHash;
use crate::node::{self, Node, Slot};

/// Searches for `key` in the subtree rooted at `current`.
///
/// Returns a reference to the value if found.
pub(crate) fn get_recursive<'a, K, V>(
    current: &'a Node<K, V>,
    shift: u32,
    hash: i32,
    key: &K,
) -> Option<&'a V>
where
    K: TrieHash,
{
    match current {
        Node::Bitmap(bitmap_node) => {
            let bit = node::mask(node::fragment(hash, shift));
            if bitmap_node.bitmap & bit == 0 {
                return None;
            }
            match &bitmap_node.slots[node::index(bitmap_node.bitmap, bit)] {
                Slot::Leaf(existing_key, value) => (existing_key == key).then_some(value),
                Slot::Child(child) => {
                    get_recursive(child, shift + node::BITS_PER_LEVEL, hash, key)
                }
            }
        }
        Node::Array(array_node) => array_node.children[node::fragment(hash, shift) as usize]
            .as_deref()
            .and_then(|child| get_recursive(child, shift + node::BITS_PER_LEVEL, hash, key)),
        Node::Collision(collision) => {
            if hash != collision.hash {
                return None;
            }
            collision
                .entries
                .iter()
                .find(|(existing_key, _)| existing_key == key)
                .map(|(_, value)| value)
        }
    }
}
