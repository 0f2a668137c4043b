//! Persistent sets, a thin façade over the map trie with unit values.

use std::fmt;

use crate::hasher::{DefaultHasher, Hasher};
use crate::map::{Keys, Tree};
use crate::node;


/// A persistent hash set backed by a [`Tree`] with unit values.
///
/// All mutating operations return a new set and leave the original
/// unchanged; unions and equality checks skip subtrees shared between
/// the two sets.
pub struct Set<K, H = DefaultHasher> {
    tree: Tree<K, (), H>,
}

impl<K, H> Set<K, H> {
    /// An empty set that hashes keys with `hasher`.
    pub fn new(hasher: H) -> Self {
        Set {
            tree: Tree::new(hasher),
        }
    }

    /// The number of elements in the set.
    pub fn size(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Whether `self` and `other` share their root node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.tree.ptr_eq(&other.tree)
    }

    /// Iterate over the elements of the set in an unspecified order.
    pub fn iter(&self) -> Keys<'_, K, ()> {
        self.tree.keys()
    }
}

impl<K, H: Hasher<K>> Set<K, H> {
    /// Whether the set contains `key`. Hashes `key` at most once.
    pub fn contains(&self, key: &K) -> bool {
        self.tree.lookup(key).is_some()
    }

    /// Whether the two sets contain the same keys.
    pub fn equal(&self, other: &Self) -> bool {
        self.tree.equal(&other.tree, |_, _| true)
    }

    /// The number of keys present in both sets, computed without building
    /// the intersection: shared subtrees are counted by their size
    /// directly, and disjoint subtrees are dismissed without a visit.
    pub fn intersection_size(&self, other: &Self) -> usize {
        node::intersection_size(
            self.tree.root.as_ref(),
            other.tree.root.as_ref(),
            &self.tree.hasher,
        )
    }
}

impl<K, H> Set<K, H>
where
    K: Clone,
    H: Hasher<K> + Clone,
{
    /// Add `key` to the set.
    pub fn insert(&self, key: K) -> Self {
        Set {
            tree: self.tree.insert(key, ()),
        }
    }

    /// Remove `key` from the set if present.
    pub fn remove(&self, key: &K) -> Self {
        Set {
            tree: self.tree.remove(key),
        }
    }

    /// The union of two sets. Subtrees present on both sides are shared
    /// with the result; in particular, `a.union(&b)` with `a ⊇ b` hands
    /// back `a`'s root by identity.
    pub fn union(&self, other: &Self) -> Self {
        Set {
            tree: self.tree.merge(&other.tree, |_, _| ((), true)),
        }
    }
}

impl<K, H: Clone> Clone for Set<K, H> {
    fn clone(&self) -> Self {
        Set {
            tree: self.tree.clone(),
        }
    }
}

impl<K, H: Default> Default for Set<K, H> {
    fn default() -> Self {
        Set {
            tree: Tree::default(),
        }
    }
}

impl<K: fmt::Debug, H> fmt::Debug for Set<K, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K, H: Hasher<K>> PartialEq for Set<K, H> {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other)
    }
}

impl<K, H: Hasher<K>> Eq for Set<K, H> {}

impl<K, H> FromIterator<K> for Set<K, H>
where
    K: Clone,
    H: Hasher<K> + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        iter.into_iter().fold(Set::default(), |set, key| set.insert(key))
    }
}

impl<'a, K, H> IntoIterator for &'a Set<K, H> {
    type Item = &'a K;
    type IntoIter = Keys<'a, K, ()>;

    fn into_iter(self) -> Keys<'a, K, ()> {
        self.iter()
    }
}
