//! Persistent maps over hashed keys.

use std::fmt;
use std::sync::Arc;

use crate::hasher::{DefaultHasher, Hasher};
use crate::node::{self, Iter, Node};


/// A persistent hash map backed by a patricia trie over hashed keys.
///
/// Mutating operations take `&self` and return a new map; the original
/// keeps answering lookups as before. Versions share every subtree an
/// operation did not rebuild, and that sharing is what [`Tree::merge`] and
/// [`Tree::equal`] exploit: shared subtrees are skipped by pointer
/// identity, so both cost time proportional to the structural difference
/// between the inputs rather than their total size.
///
/// Hash collisions are resolved by a per-leaf bucket scanned with the
/// hasher's `equal`, so any [`Hasher`] that honors its contract is usable
/// regardless of hash quality.
pub struct Tree<K, V, H = DefaultHasher> {
    pub(crate) hasher: H,
    pub(crate) root: Option<Arc<Node<K, V>>>,
}

impl<K, V, H> Tree<K, V, H> {
    /// An empty map that hashes keys with `hasher`.
    pub fn new(hasher: H) -> Self {
        Tree { hasher, root: None }
    }

    /// The number of key-value pairs in the map.
    pub fn size(&self) -> usize {
        node::size(self.root.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Whether `self` and `other` share their root node. Root identity
    /// implies equality; the converse holds only where sharing was
    /// preserved.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Iterate over the pairs of the map in an unspecified order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self.root.as_ref())
    }

    /// Iterate over the keys of the map in an unspecified order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Iterate over the values of the map in an unspecified order.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }
}

impl<K, V, H: Hasher<K>> Tree<K, V, H> {
    /// The big-endian hashed key. Reversing the bits up front turns the
    /// low-bit-first trie into a big-endian one without touching any of
    /// the algorithms; branch bits then discriminate high bits near the
    /// root, which is the fast layout in practice.
    fn hash(&self, key: &K) -> u64 {
        self.hasher.hash(key).reverse_bits()
    }

    /// The value mapped to `key`, if any. Hashes `key` at most once.
    pub fn lookup(&self, key: &K) -> Option<&V> {
        let root = self.root.as_ref()?;
        node::lookup(root, self.hash(key), key, &self.hasher)
    }

    /// Structural equality, with `value_eq` deciding value equality.
    /// Subtrees shared between the two maps are skipped by identity.
    pub fn equal<F>(&self, other: &Self, value_eq: F) -> bool
    where
        F: Fn(&V, &V) -> bool,
    {
        node::equal(self.root.as_ref(), other.root.as_ref(), &self.hasher, &value_eq)
    }
}

impl<K, V, H> Tree<K, V, H>
where
    K: Clone,
    V: Clone,
    H: Hasher<K> + Clone,
{
    fn with_root(&self, root: Option<Arc<Node<K, V>>>) -> Self {
        Tree {
            hasher: self.hasher.clone(),
            root,
        }
    }

    /// Insert `key ↦ value`, replacing any previous value for the key.
    pub fn insert(&self, key: K, value: V) -> Self {
        let hash = self.hash(&key);
        let (root, _) = node::insert(
            self.root.as_ref(),
            hash,
            key,
            value,
            &self.hasher,
            None::<&fn(&V, &V) -> (V, bool)>,
        );
        self.with_root(Some(root))
    }

    /// Insert `key ↦ value`, reconciling with `f` when a previous value
    /// exists: the stored value becomes `f`'s result instead of `value`.
    /// `f` is subject to the same contract as in [`Tree::merge`].
    pub fn insert_or_merge<F>(&self, key: K, value: V, f: F) -> Self
    where
        F: Fn(&V, &V) -> (V, bool),
    {
        let hash = self.hash(&key);
        let (root, _) = node::insert(self.root.as_ref(), hash, key, value, &self.hasher, Some(&f));
        self.with_root(Some(root))
    }

    /// Remove the pair for `key` if present. Removing an absent key
    /// returns a map sharing its whole root with `self`.
    pub fn remove(&self, key: &K) -> Self {
        let hash = self.hash(key);
        self.with_root(node::remove(self.root.as_ref(), hash, key, &self.hasher))
    }

    /// The keywise union of two maps. A key present on both sides maps to
    /// `f` applied to the two values; no guarantee is made about the
    /// argument order, so `f` must be commutative and idempotent.
    ///
    /// The boolean `f` returns must be true exactly when its arguments are
    /// equal under the caller's notion of value equality. That flag is
    /// what lets the merge return shared subtrees, and whole inputs, by
    /// identity: an `f` that always reports `false` is still correct but
    /// disables most sharing. Merging skips subtrees the two maps already
    /// share, so merging a map with an `r`-update descendant of itself
    /// costs O(r) rather than O(size).
    pub fn merge<F>(&self, other: &Self, f: F) -> Self
    where
        F: Fn(&V, &V) -> (V, bool),
    {
        let (root, _) = node::merge(self.root.as_ref(), other.root.as_ref(), &self.hasher, &f);
        self.with_root(root)
    }
}

impl<K, V, H: Clone> Clone for Tree<K, V, H> {
    fn clone(&self) -> Self {
        Tree {
            hasher: self.hasher.clone(),
            root: self.root.clone(),
        }
    }
}

impl<K, V, H: Default> Default for Tree<K, V, H> {
    fn default() -> Self {
        Tree::new(H::default())
    }
}

impl<K, V, H> fmt::Debug for Tree<K, V, H>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, H> PartialEq for Tree<K, V, H>
where
    V: PartialEq,
    H: Hasher<K>,
{
    fn eq(&self, other: &Self) -> bool {
        self.equal(other, |a, b| a == b)
    }
}

impl<K, V, H> Eq for Tree<K, V, H>
where
    V: Eq,
    H: Hasher<K>,
{
}

impl<K, V, H> FromIterator<(K, V)> for Tree<K, V, H>
where
    K: Clone,
    V: Clone,
    H: Hasher<K> + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Tree::default(), |tree, (key, value)| tree.insert(key, value))
    }
}

impl<'a, K, V, H> IntoIterator for &'a Tree<K, V, H> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

/// Iterator over the keys of a [`Tree`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(key, _)| key)
    }
}

/// Iterator over the values of a [`Tree`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, value)| value)
    }
}
