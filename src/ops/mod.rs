//! Recursive node operations, one module per operation.
//!
//! Each operation starts with a variant match that forwards to the routine
//! for the node kind; recursion walks the key's hash five bits per level
//! and rewrites only the nodes on the root-to-leaf path it touches.

pub(crate) mod get;
pub(crate) mod insert;
pub(crate) mod remove;
