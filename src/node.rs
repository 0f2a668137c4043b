//! Trie node representation and the structural algorithms over it.
//!
//! A subtree is either absent (`None` at the root), a leaf holding the
//! bucket of pairs for one hashed key, or a branch splitting on a single
//! bit. Nodes are immutable after construction and shared between tree
//! versions through `Arc`; every algorithm below leans on that sharing by
//! comparing nodes for pointer identity before looking at their contents.

use std::slice;
use std::sync::Arc;

use crate::hasher::Hasher;

/// Hashed keys, bit-reversed up front so the low-bit-first trie below
/// behaves big-endian in practice.
pub(crate) type HashKey = u64;

#[inline]
pub(crate) fn zero_bit(key: HashKey, bit: HashKey) -> bool {
    key & bit == 0
}

/// A word with a single bit set at the lowest position where `p0` and `p1`
/// differ. The prefixes must not be equal.
#[inline]
pub(crate) fn branching_bit(p0: HashKey, p1: HashKey) -> HashKey {
    let diff = p0 ^ p1;
    diff & diff.wrapping_neg()
}

#[derive(Clone)]
pub(crate) struct Pair<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
}

pub(crate) struct Leaf<K, V> {
    /// Hashed key shared by every pair in the bucket.
    pub(crate) hash: HashKey,
    /// Pairs whose distinct keys collided on `hash`, in insertion order.
    pub(crate) bucket: Vec<Pair<K, V>>,
}

pub(crate) struct Branch<K, V> {
    /// Bits below `branch_bit`, common to every hashed key in the subtree.
    pub(crate) prefix: HashKey,
    /// Single-bit mask marking the position where the children diverge.
    pub(crate) branch_bit: HashKey,
    pub(crate) left: Arc<Node<K, V>>,
    pub(crate) right: Arc<Node<K, V>>,
    pub(crate) size: usize,
}

pub(crate) enum Node<K, V> {
    Leaf(Leaf<K, V>),
    Branch(Branch<K, V>),
}

impl<K, V> Branch<K, V> {
    /// Whether `key` belongs in this branch's subtree.
    #[inline]
    fn matches(&self, key: HashKey) -> bool {
        key & (self.branch_bit - 1) == self.prefix
    }
}

pub(crate) fn node_size<K, V>(node: &Node<K, V>) -> usize {
    match node {
        Node::Leaf(leaf) => leaf.bucket.len(),
        Node::Branch(branch) => branch.size,
    }
}

pub(crate) fn size<K, V>(root: Option<&Arc<Node<K, V>>>) -> usize {
    root.map_or(0, |node| node_size(node))
}

fn singleton<K, V>(hash: HashKey, key: K, value: V) -> Arc<Node<K, V>> {
    Arc::new(Node::Leaf(Leaf {
        hash,
        bucket: vec![Pair { key, value }],
    }))
}

/// Combine two subtrees whose prefixes `p0` and `p1` disagree.
fn join<K, V>(
    p0: HashKey,
    p1: HashKey,
    t0: Arc<Node<K, V>>,
    t1: Arc<Node<K, V>>,
) -> Arc<Node<K, V>> {
    debug_assert_ne!(p0, p1);
    let branch_bit = branching_bit(p0, p1);
    let prefix = p0 & (branch_bit - 1);
    let size = node_size(&t0) + node_size(&t1);
    let (left, right) = if zero_bit(p0, branch_bit) {
        (t0, t1)
    } else {
        (t1, t0)
    };
    Arc::new(Node::Branch(Branch {
        prefix,
        branch_bit,
        left,
        right,
        size,
    }))
}

/// Smart branch constructor: a branch never carries an empty child, so an
/// empty side yields the sibling instead.
fn branch<K, V>(
    prefix: HashKey,
    branch_bit: HashKey,
    left: Option<Arc<Node<K, V>>>,
    right: Option<Arc<Node<K, V>>>,
) -> Option<Arc<Node<K, V>>> {
    match (left, right) {
        (Some(left), Some(right)) => {
            let size = node_size(&left) + node_size(&right);
            Some(Arc::new(Node::Branch(Branch {
                prefix,
                branch_bit,
                left,
                right,
                size,
            })))
        }
        (None, child) | (child, None) => child,
    }
}

pub(crate) fn lookup<'a, K, V, H>(
    root: &'a Arc<Node<K, V>>,
    hash: HashKey,
    key: &K,
    hasher: &H,
) -> Option<&'a V>
where
    H: Hasher<K>,
{
    let mut node = root;
    loop {
        match &**node {
            Node::Leaf(leaf) => {
                if leaf.hash != hash {
                    return None;
                }
                return leaf
                    .bucket
                    .iter()
                    .find(|pair| hasher.equal(key, &pair.key))
                    .map(|pair| &pair.value);
            }
            Node::Branch(branch) => {
                if !branch.matches(hash) {
                    return None;
                }
                node = if zero_bit(hash, branch.branch_bit) {
                    &branch.left
                } else {
                    &branch.right
                };
            }
        }
    }
}

/// Insert `key ↦ value` under its hashed key. With a merge function, an
/// existing value for the key becomes `f(value, previous)`; without one it
/// is replaced.
///
/// The returned flag is false exactly when the result is the input node,
/// which happens only when the merge function reported its operands equal.
pub(crate) fn insert<K, V, H, F>(
    root: Option<&Arc<Node<K, V>>>,
    hash: HashKey,
    key: K,
    value: V,
    hasher: &H,
    merge_fn: Option<&F>,
) -> (Arc<Node<K, V>>, bool)
where
    K: Clone,
    V: Clone,
    H: Hasher<K>,
    F: Fn(&V, &V) -> (V, bool),
{
    let node = match root {
        None => return (singleton(hash, key, value), true),
        Some(node) => node,
    };

    let prefix = match &**node {
        Node::Leaf(leaf) => {
            if leaf.hash == hash {
                if let Some(i) = leaf
                    .bucket
                    .iter()
                    .position(|pair| hasher.equal(&key, &pair.key))
                {
                    let value = match merge_fn {
                        None => value,
                        Some(f) => {
                            let (merged, same) = f(&value, &leaf.bucket[i].value);
                            if same {
                                return (Arc::clone(node), false);
                            }
                            merged
                        }
                    };
                    let mut bucket = leaf.bucket.clone();
                    bucket[i].value = value;
                    return (Arc::new(Node::Leaf(Leaf { hash, bucket })), true);
                }

                // Distinct key with the same hash: grow the bucket.
                let mut bucket = leaf.bucket.clone();
                bucket.push(Pair { key, value });
                return (Arc::new(Node::Leaf(Leaf { hash, bucket })), true);
            }
            leaf.hash
        }
        Node::Branch(branch) => {
            if branch.matches(hash) {
                let (left, right, changed) = if zero_bit(hash, branch.branch_bit) {
                    let (left, changed) =
                        insert(Some(&branch.left), hash, key, value, hasher, merge_fn);
                    (left, Arc::clone(&branch.right), changed)
                } else {
                    let (right, changed) =
                        insert(Some(&branch.right), hash, key, value, hasher, merge_fn);
                    (Arc::clone(&branch.left), right, changed)
                };
                if !changed {
                    return (Arc::clone(node), false);
                }
                let size = node_size(&left) + node_size(&right);
                return (
                    Arc::new(Node::Branch(Branch {
                        prefix: branch.prefix,
                        branch_bit: branch.branch_bit,
                        left,
                        right,
                        size,
                    })),
                    true,
                );
            }
            branch.prefix
        }
    };

    // The hashed key lands outside this subtree entirely.
    (
        join(hash, prefix, singleton(hash, key, value), Arc::clone(node)),
        true,
    )
}

/// Remove the pair for `key` if present. A removal that changes nothing
/// returns the input node itself, so callers can detect no-ops by identity.
pub(crate) fn remove<K, V, H>(
    root: Option<&Arc<Node<K, V>>>,
    hash: HashKey,
    key: &K,
    hasher: &H,
) -> Option<Arc<Node<K, V>>>
where
    K: Clone,
    V: Clone,
    H: Hasher<K>,
{
    let node = root?;

    match &**node {
        Node::Leaf(leaf) => {
            if leaf.hash == hash {
                if let Some(i) = leaf
                    .bucket
                    .iter()
                    .position(|pair| hasher.equal(key, &pair.key))
                {
                    if leaf.bucket.len() == 1 {
                        return None;
                    }
                    let mut bucket = leaf.bucket.clone();
                    bucket.remove(i);
                    return Some(Arc::new(Node::Leaf(Leaf {
                        hash: leaf.hash,
                        bucket,
                    })));
                }
            }
            Some(Arc::clone(node))
        }
        Node::Branch(b) => {
            if !b.matches(hash) {
                return Some(Arc::clone(node));
            }
            if zero_bit(hash, b.branch_bit) {
                let left = remove(Some(&b.left), hash, key, hasher);
                if left.as_ref().is_some_and(|l| Arc::ptr_eq(l, &b.left)) {
                    return Some(Arc::clone(node));
                }
                branch(b.prefix, b.branch_bit, left, Some(Arc::clone(&b.right)))
            } else {
                let right = remove(Some(&b.right), hash, key, hasher);
                if right.as_ref().is_some_and(|r| Arc::ptr_eq(r, &b.right)) {
                    return Some(Arc::clone(node));
                }
                branch(b.prefix, b.branch_bit, Some(Arc::clone(&b.left)), right)
            }
        }
    }
}

/// Keywise union of two subtrees, reconciling colliding values with
/// `merge_fn`. The flag is true when the inputs represented equal trees;
/// callers use it to hand back an existing node instead of rebuilding.
pub(crate) fn merge<K, V, H, F>(
    a: Option<&Arc<Node<K, V>>>,
    b: Option<&Arc<Node<K, V>>>,
    hasher: &H,
    merge_fn: &F,
) -> (Option<Arc<Node<K, V>>>, bool)
where
    K: Clone,
    V: Clone,
    H: Hasher<K>,
    F: Fn(&V, &V) -> (V, bool),
{
    match (a, b) {
        (None, None) => (None, true),
        (Some(a), None) => (Some(Arc::clone(a)), false),
        (None, Some(b)) => (Some(Arc::clone(b)), false),
        (Some(a), Some(b)) => {
            let (node, equal) = merge_nodes(a, b, hasher, merge_fn);
            (Some(node), equal)
        }
    }
}

fn merge_nodes<K, V, H, F>(
    a: &Arc<Node<K, V>>,
    b: &Arc<Node<K, V>>,
    hasher: &H,
    merge_fn: &F,
) -> (Arc<Node<K, V>>, bool)
where
    K: Clone,
    V: Clone,
    H: Hasher<K>,
    F: Fn(&V, &V) -> (V, bool),
{
    // Shared subtrees merge to themselves. This is what makes self-merges
    // O(1) and merges of trees with common ancestry pay only for the
    // non-shared portion.
    if Arc::ptr_eq(a, b) {
        return (Arc::clone(a), true);
    }

    let (s, t) = match (&**a, &**b) {
        (Node::Leaf(leaf), _) => return merge_leaf(leaf, b, a, hasher, merge_fn),
        (_, Node::Leaf(leaf)) => return merge_leaf(leaf, a, a, hasher, merge_fn),
        (Node::Branch(s), Node::Branch(t)) => (s, t),
    };

    if s.branch_bit == t.branch_bit && s.prefix == t.prefix {
        let (left, left_eq) = merge_nodes(&s.left, &t.left, hasher, merge_fn);
        let (right, right_eq) = merge_nodes(&s.right, &t.right, hasher, merge_fn);
        if left_eq && right_eq {
            return (Arc::clone(a), true);
        }
        // Reuse an input branch whole when each merged child is either
        // equal to or identically its child.
        if (left_eq || Arc::ptr_eq(&left, &s.left)) && (right_eq || Arc::ptr_eq(&right, &s.right)) {
            return (Arc::clone(a), false);
        }
        if (left_eq || Arc::ptr_eq(&left, &t.left)) && (right_eq || Arc::ptr_eq(&right, &t.right)) {
            return (Arc::clone(b), false);
        }
        let size = node_size(&left) + node_size(&right);
        return (
            Arc::new(Node::Branch(Branch {
                prefix: s.prefix,
                branch_bit: s.branch_bit,
                left,
                right,
                size,
            })),
            false,
        );
    }

    // Normalize so `s` is the shallower branch (smaller branching bit).
    let (s, s_node, t, t_node) = if s.branch_bit <= t.branch_bit {
        (s, a, t, b)
    } else {
        (t, b, s, a)
    };

    if s.branch_bit < t.branch_bit && s.matches(t.prefix) {
        // `t` sits entirely inside one child of `s`.
        if zero_bit(t.prefix, s.branch_bit) {
            let (left, _) = merge_nodes(&s.left, t_node, hasher, merge_fn);
            if Arc::ptr_eq(&left, &s.left) {
                return (Arc::clone(s_node), false);
            }
            let size = node_size(&left) + node_size(&s.right);
            return (
                Arc::new(Node::Branch(Branch {
                    prefix: s.prefix,
                    branch_bit: s.branch_bit,
                    left,
                    right: Arc::clone(&s.right),
                    size,
                })),
                false,
            );
        }
        let (right, _) = merge_nodes(&s.right, t_node, hasher, merge_fn);
        if Arc::ptr_eq(&right, &s.right) {
            return (Arc::clone(s_node), false);
        }
        let size = node_size(&s.left) + node_size(&right);
        return (
            Arc::new(Node::Branch(Branch {
                prefix: s.prefix,
                branch_bit: s.branch_bit,
                left: Arc::clone(&s.left),
                right,
                size,
            })),
            false,
        );
    }

    // Disjoint prefixes: the subtrees cover disjoint key ranges.
    (
        join(
            s.prefix,
            t.prefix,
            Arc::clone(s_node),
            Arc::clone(t_node),
        ),
        false,
    )
}

/// Fold a leaf's bucket into the peer subtree. `a` is the node handed back
/// when the two sides turn out to have been equal all along.
fn merge_leaf<K, V, H, F>(
    leaf: &Leaf<K, V>,
    other: &Arc<Node<K, V>>,
    a: &Arc<Node<K, V>>,
    hasher: &H,
    merge_fn: &F,
) -> (Arc<Node<K, V>>, bool)
where
    K: Clone,
    V: Clone,
    H: Hasher<K>,
    F: Fn(&V, &V) -> (V, bool),
{
    let mut folded = Arc::clone(other);
    for pair in &leaf.bucket {
        let (next, _) = insert(
            Some(&folded),
            leaf.hash,
            pair.key.clone(),
            pair.value.clone(),
            hasher,
            Some(merge_fn),
        );
        folded = next;
    }

    if Arc::ptr_eq(&folded, other) {
        if let Node::Leaf(other_leaf) = &**other {
            if other_leaf.bucket.len() == leaf.bucket.len() {
                // The peer is also a leaf, absorbed every pair without
                // changing, and holds no extra pairs: the two leaves were
                // (and still are) equal.
                return (Arc::clone(a), true);
            }
        }
    }

    (folded, false)
}

pub(crate) fn equal<K, V, H, F>(
    a: Option<&Arc<Node<K, V>>>,
    b: Option<&Arc<Node<K, V>>>,
    hasher: &H,
    value_eq: &F,
) -> bool
where
    H: Hasher<K>,
    F: Fn(&V, &V) -> bool,
{
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => equal_nodes(a, b, hasher, value_eq),
        _ => false,
    }
}

fn equal_nodes<K, V, H, F>(
    a: &Arc<Node<K, V>>,
    b: &Arc<Node<K, V>>,
    hasher: &H,
    value_eq: &F,
) -> bool
where
    H: Hasher<K>,
    F: Fn(&V, &V) -> bool,
{
    if Arc::ptr_eq(a, b) {
        return true;
    }
    match (&**a, &**b) {
        (Node::Leaf(a), Node::Leaf(b)) => {
            // Bucket keys are pairwise distinct, so matching lengths plus
            // an everywhere-found scan is set equality.
            a.hash == b.hash
                && a.bucket.len() == b.bucket.len()
                && a.bucket.iter().all(|ap| {
                    b.bucket
                        .iter()
                        .any(|bp| hasher.equal(&ap.key, &bp.key) && value_eq(&ap.value, &bp.value))
                })
        }
        (Node::Branch(a), Node::Branch(b)) => {
            a.prefix == b.prefix
                && a.branch_bit == b.branch_bit
                && equal_nodes(&a.left, &b.left, hasher, value_eq)
                && equal_nodes(&a.right, &b.right, hasher, value_eq)
        }
        _ => false,
    }
}

/// |keys(a) ∩ keys(b)| without materializing the intersection.
pub(crate) fn intersection_size<K, V, H>(
    a: Option<&Arc<Node<K, V>>>,
    b: Option<&Arc<Node<K, V>>>,
    hasher: &H,
) -> usize
where
    H: Hasher<K>,
{
    match (a, b) {
        (Some(a), Some(b)) => intersection_nodes(a, b, hasher),
        _ => 0,
    }
}

fn intersection_nodes<K, V, H>(a: &Arc<Node<K, V>>, b: &Arc<Node<K, V>>, hasher: &H) -> usize
where
    H: Hasher<K>,
{
    if Arc::ptr_eq(a, b) {
        return node_size(a);
    }

    let (s, t) = match (&**a, &**b) {
        (Node::Leaf(leaf), _) => return bucket_hits(leaf, b, hasher),
        (_, Node::Leaf(leaf)) => return bucket_hits(leaf, a, hasher),
        (Node::Branch(s), Node::Branch(t)) => (s, t),
    };

    if s.branch_bit == t.branch_bit && s.prefix == t.prefix {
        return intersection_nodes(&s.left, &t.left, hasher)
            + intersection_nodes(&s.right, &t.right, hasher);
    }

    let (s, t, t_node) = if s.branch_bit <= t.branch_bit {
        (s, t, b)
    } else {
        (t, s, a)
    };

    if s.branch_bit < t.branch_bit && s.matches(t.prefix) {
        let child = if zero_bit(t.prefix, s.branch_bit) {
            &s.left
        } else {
            &s.right
        };
        return intersection_nodes(child, t_node, hasher);
    }

    // Disjoint prefixes share no keys.
    0
}

/// How many of the leaf's keys are also present in `other`.
fn bucket_hits<K, V, H>(leaf: &Leaf<K, V>, other: &Arc<Node<K, V>>, hasher: &H) -> usize
where
    H: Hasher<K>,
{
    leaf.bucket
        .iter()
        .filter(|pair| lookup(other, leaf.hash, &pair.key, hasher).is_some())
        .count()
}

/// Lazy traversal over the pairs of a subtree. Leaves are visited left to
/// right; the order is deterministic for a given tree shape but carries no
/// meaning. The caller may stop early.
pub struct Iter<'a, K, V> {
    stack: Vec<&'a Node<K, V>>,
    bucket: slice::Iter<'a, Pair<K, V>>,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(root: Option<&'a Arc<Node<K, V>>>) -> Self {
        Iter {
            stack: root.map(|node| &**node).into_iter().collect(),
            bucket: Default::default(),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(pair) = self.bucket.next() {
                return Some((&pair.key, &pair.value));
            }
            match self.stack.pop()? {
                Node::Leaf(leaf) => self.bucket = leaf.bucket.iter(),
                Node::Branch(branch) => {
                    self.stack.push(&branch.right);
                    self.stack.push(&branch.left);
                }
            }
        }
    }
}
