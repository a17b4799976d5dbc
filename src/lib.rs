//! Immutable hash-array-mapped trie with context variables on top.
//!
//! Two layers:
//!
//! - [`HamtMap`] — a persistent key/value mapping. Updates return a new
//!   map that shares almost all of its structure with the old one, so a
//!   snapshot is O(1) and a point update is O(log₃₂ n). Old versions stay
//!   valid and readable forever.
//! - [`Context`] / [`ContextVar`] — per-thread scoped variable bindings
//!   stored in a `HamtMap`: enter/exit stacking, cheap context copies,
//!   and single-use restore [`Token`]s, with a per-variable fast-path
//!   read cache keyed on versioned thread identity.
//!
//! # Key properties
//!
//! - **Structural sharing**: an update rewrites only the root-to-leaf path
//!   it touches; everything else is shared by refcount
//! - **Three node shapes by load**: sparse bitmap nodes, dense 32-way
//!   array nodes, and collision nodes for equal 32-bit hashes
//! - **Zero-allocation iteration**: the depth-first walker fits its whole
//!   state in two fixed arrays
//! - **Zero `unsafe`**: enforced by `#![forbid(unsafe_code)]`
//!
//! # References
//!
//! - Bagwell, 2001 — "Ideal Hash Trees"

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod hash;
pub mod iter;

mod context;
mod error;
mod map;
mod node;
mod ops;
mod var;

#[cfg(test)]
mod tests;

pub use context::{AnyValue, Context};
pub use error::ContextError;
pub use hash::TrieHash;
pub use map::HamtMap;
pub use var::{ContextVar, Token, VarKey};
