//! Key hashing — 32-bit trie hashes.
//!
//! The trie consumes hashes five bits at a time, so every key must reduce
//! to a 32-bit value. Wider hashes are folded by XOR of their halves; the
//! value −1 is reserved and a genuine hash that folds to it is remapped
//! to −2.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Keys supply their own 32-bit trie hash.
///
/// The tree's shape is a pure function of key hashes: bits
/// `[5·level, 5·level + 5)` select the slot at each level. Implementations
/// must return a stable value for as long as the key is stored in a map.
///
/// Most key types delegate to [`fold_hash`]; types that carry a
/// precomputed hash (such as [`VarKey`](crate::VarKey)) return it
/// directly.
pub trait TrieHash: Eq {
    /// Returns the 32-bit hash that positions this key in the trie.
    fn trie_hash(&self) -> i32;
}

/// Hashes a value with the std hasher and folds the result to 32 bits.
#[must_use]
pub fn fold_hash<T: Hash + ?Sized>(value: &T) -> i32 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    fold_u64(hasher.finish())
}

/// Folds a 64-bit hash to 32 bits by XOR of its high and low halves.
///
/// This exact reduction is load-bearing: tests pin tree shapes to it, so
/// it must not be replaced with a stronger mix. −1 remaps to −2.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const fn fold_u64(hash: u64) -> i32 {
    let xored = (hash as u32 ^ (hash >> 32) as u32) as i32;
    if xored == -1 { -2 } else { xored }
}

macro_rules! impl_trie_hash_via_fold {
    ($($ty:ty),* $(,)?) => {
        $(
            impl TrieHash for $ty {
                fn trie_hash(&self) -> i32 {
                    fold_hash(self)
                }
            }
        )*
    };
}

impl_trie_hash_via_fold!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, String,
);

impl TrieHash for &str {
    fn trie_hash(&self) -> i32 {
        fold_hash(*self)
    }
}
