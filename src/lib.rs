//! Persistent key-value maps and sets with an efficient merge operation.
//!
//! The containers in this crate are immutable values: inserts, removals,
//! merges, and unions return a new container and leave the original
//! untouched. Versions share every subtree an operation did not rebuild.
//! That sharing is load-bearing rather than an optimization: merge,
//! equality, and intersection-size skip shared subtrees by pointer
//! identity, so their cost scales with the structural difference between
//! the inputs instead of their total size. Merging a tree with itself is
//! O(1), and merging a tree with a version of itself that is `r` updates
//! away costs O(`r`).
//!
//! # Hashing
//! Keys are stored under a 64-bit hash produced by a [`Hasher`]
//! implementation chosen per tree. The backing structure is a patricia
//! trie over those hashes; hash bits are reversed on entry, which turns
//! the little-endian trie big-endian in practice without changing any
//! algorithm. Collisions land in per-leaf buckets that are scanned with
//! the hasher's equality, so a weak hash function degrades throughput but
//! never correctness.
//!
//! # Merging
//! [`Tree::merge`] folds two maps into their keywise union, reconciling
//! values stored under the same key with a caller-supplied operator. The
//! operator must be commutative and idempotent, and report whether its two
//! arguments were already equal; that report is what allows the merge to
//! hand back existing subtrees (and whole inputs) by identity instead of
//! rebuilding them. [`Set::union`] is the same machinery with unit values.

pub(crate) mod hasher;
pub(crate) mod map;
pub(crate) mod node;
pub(crate) mod set;
#[cfg(test)]
pub(crate) mod test_workloads;

pub use hasher::{DefaultHasher, Hasher, NumericHasher, PtrHasher, StringHasher};
pub use map::{Keys, Tree, Values};
pub use node::Iter;
pub use set::Set;
