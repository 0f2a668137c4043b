//! Shared oracle-driven workloads for the map and set tests.
//!
//! Each workload is a sequence of operations interpreted against both a
//! tree and a `BTreeMap`/`BTreeSet` oracle. Saved snapshots are replayed
//! at the end to check that old versions kept answering from their own
//! history.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::iter::once;
use std::rc::Rc;

use rand::Rng;

use crate::hasher::Hasher;
use crate::{Set, Tree};

#[derive(Debug)]
pub(crate) enum Operation {
    Insert(u64),
    Remove(u64),
    Save,
    Merge(usize),
    Dump,
}

/// Reconcile colliding values by keeping the larger one.
pub(crate) fn take_max(a: &u64, b: &u64) -> (u64, bool) {
    (*a.max(b), a == b)
}

/// Collapses every key onto one hash, forcing everything into one bucket.
#[derive(Clone, Copy, Default)]
pub(crate) struct BadHasher;

impl Hasher<u64> for BadHasher {
    fn hash(&self, _: &u64) -> u64 {
        0
    }

    fn equal(&self, a: &u64, b: &u64) -> bool {
        a == b
    }
}

/// Memoizes a random hash below `limit` per key: deterministic per key,
/// but collisions are frequent by construction.
#[derive(Clone)]
pub(crate) struct MemHasher {
    memo: Rc<RefCell<HashMap<u64, u64>>>,
    limit: u64,
}

impl MemHasher {
    pub(crate) fn new(limit: u64) -> Self {
        MemHasher {
            memo: Rc::default(),
            limit,
        }
    }
}

impl Hasher<u64> for MemHasher {
    fn hash(&self, key: &u64) -> u64 {
        *self
            .memo
            .borrow_mut()
            .entry(*key)
            .or_insert_with(|| rand::thread_rng().gen_range(0..self.limit))
    }

    fn equal(&self, a: &u64, b: &u64) -> bool {
        a == b
    }
}

/// Counts `hash` invocations; the counter is shared across clones so the
/// handles a persistent operation returns keep feeding the same tally.
#[derive(Clone, Default)]
pub(crate) struct CountingHasher {
    pub(crate) calls: Rc<Cell<usize>>,
}

impl Hasher<u64> for CountingHasher {
    fn hash(&self, key: &u64) -> u64 {
        self.calls.set(self.calls.get() + 1);
        *key
    }

    fn equal(&self, a: &u64, b: &u64) -> bool {
        a == b
    }
}

/// A key whose hash ignores the second field, so `collider` pairs always
/// share a bucket.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub(crate) struct Collider(pub(crate) u64, pub(crate) u64);

#[derive(Clone, Copy, Default)]
pub(crate) struct ColliderHasher;

impl Hasher<Collider> for ColliderHasher {
    fn hash(&self, key: &Collider) -> u64 {
        key.0
    }

    fn equal(&self, a: &Collider, b: &Collider) -> bool {
        a == b
    }
}

pub(crate) fn collider(i: u64) -> (Collider, Collider) {
    (Collider(i, 0), Collider(i, 1))
}

pub(crate) fn test_tree<H>(hasher: H, ops: impl IntoIterator<Item = Operation>)
where
    H: Hasher<u64> + Clone,
{
    let mut oracle = BTreeMap::<u64, u64>::new();
    let mut tree = Tree::<u64, u64, H>::new(hasher);
    let mut saved: Vec<(Tree<u64, u64, H>, BTreeMap<u64, u64>)> = Vec::new();

    for op in ops {
        match op {
            Operation::Insert(i) => {
                let (k, v) = (i, i + 1);
                assert_eq!(oracle.get(&k), tree.lookup(&k));
                let next = tree.insert(k, v);
                // The pre-insert version keeps answering as before.
                assert_eq!(oracle.get(&k), tree.lookup(&k));
                oracle.insert(k, v);
                tree = next;
                assert_eq!(Some(&v), tree.lookup(&k));
                assert_eq!(oracle.len(), tree.size());
            }
            Operation::Remove(i) => {
                assert_eq!(oracle.contains_key(&i), tree.lookup(&i).is_some());
                let next = tree.remove(&i);
                assert_eq!(oracle.contains_key(&i), tree.lookup(&i).is_some());
                oracle.remove(&i);
                tree = next;
                assert_eq!(None, tree.lookup(&i));
                assert_eq!(oracle.len(), tree.size());
            }
            Operation::Dump => {
                assert_eq!(oracle.len(), tree.size());
                let expect: Vec<(u64, u64)> = oracle.iter().map(|(k, v)| (*k, *v)).collect();
                let mut got: Vec<(u64, u64)> = tree.iter().map(|(k, v)| (*k, *v)).collect();
                got.sort();
                assert_eq!(expect, got);
            }
            Operation::Merge(i) => {
                let (prev, prev_oracle) = &saved[i];
                let merged = tree.merge(prev, take_max);
                let swapped = prev.merge(&tree, take_max);
                assert!(merged.equal(&swapped, |a, b| a == b));
                for (k, v) in prev_oracle {
                    let entry = oracle.entry(*k).or_insert(*v);
                    *entry = (*entry).max(*v);
                }
                tree = merged;
                assert_eq!(oracle.len(), tree.size());
            }
            Operation::Save => {
                saved.push((tree.clone(), oracle.clone()));
            }
        }
    }

    // Saved versions still answer from their own history.
    for (tree, oracle) in &saved {
        assert_eq!(oracle.len(), tree.size());
        for (k, v) in oracle {
            assert_eq!(Some(v), tree.lookup(k));
        }
    }
}

pub(crate) fn test_tree_collision(ops: impl IntoIterator<Item = Operation>) {
    let mut oracle = BTreeMap::<Collider, u64>::new();
    let mut tree = Tree::<Collider, u64, ColliderHasher>::default();
    // Built with every collider pair inserted in the opposite order, so
    // equality must hold across different bucket orders.
    let mut mirror = Tree::<Collider, u64, ColliderHasher>::default();
    let mut saved: Vec<(Tree<Collider, u64, ColliderHasher>, BTreeMap<Collider, u64>)> = Vec::new();

    for op in ops {
        match op {
            Operation::Insert(i) => {
                let (k1, k2) = collider(i);
                let v = i + 1;
                assert_eq!(oracle.get(&k1), tree.lookup(&k1));
                assert_eq!(oracle.get(&k2), tree.lookup(&k2));
                tree = tree.insert(k1, v).insert(k2, v);
                mirror = mirror.insert(k2, v).insert(k1, v);
                oracle.insert(k1, v);
                oracle.insert(k2, v);
                assert_eq!(Some(&v), tree.lookup(&k1));
                assert_eq!(Some(&v), tree.lookup(&k2));
                assert!(tree.equal(&mirror, |a, b| a == b));
                assert_eq!(oracle.len(), tree.size());
            }
            Operation::Remove(i) => {
                let (k1, k2) = collider(i);
                assert_eq!(oracle.contains_key(&k1), tree.lookup(&k1).is_some());
                assert_eq!(oracle.contains_key(&k2), tree.lookup(&k2).is_some());
                tree = tree.remove(&k1).remove(&k2);
                mirror = mirror.remove(&k2).remove(&k1);
                oracle.remove(&k1);
                oracle.remove(&k2);
                assert_eq!(None, tree.lookup(&k1));
                assert_eq!(None, tree.lookup(&k2));
                assert!(tree.equal(&mirror, |a, b| a == b));
                assert_eq!(oracle.len(), tree.size());
            }
            Operation::Dump => {
                assert_eq!(oracle.len(), tree.size());
                let expect: Vec<(Collider, u64)> = oracle.iter().map(|(k, v)| (*k, *v)).collect();
                let mut got: Vec<(Collider, u64)> = tree.iter().map(|(k, v)| (*k, *v)).collect();
                got.sort();
                assert_eq!(expect, got);
            }
            Operation::Merge(i) => {
                let (prev, prev_oracle) = &saved[i];
                tree = tree.merge(prev, take_max);
                mirror = mirror.merge(prev, take_max);
                for (k, v) in prev_oracle {
                    let entry = oracle.entry(*k).or_insert(*v);
                    *entry = (*entry).max(*v);
                }
                assert!(tree.equal(&mirror, |a, b| a == b));
                assert_eq!(oracle.len(), tree.size());
            }
            Operation::Save => {
                saved.push((tree.clone(), oracle.clone()));
            }
        }
    }

    for (tree, oracle) in &saved {
        assert_eq!(oracle.len(), tree.size());
        for (k, v) in oracle {
            assert_eq!(Some(v), tree.lookup(k));
        }
    }
}

pub(crate) fn test_set<H>(hasher: H, ops: impl IntoIterator<Item = Operation>)
where
    H: Hasher<u64> + Clone,
{
    let mut oracle = BTreeSet::<u64>::new();
    let mut set = Set::<u64, H>::new(hasher);
    let mut saved: Vec<(Set<u64, H>, BTreeSet<u64>)> = Vec::new();

    for op in ops {
        match op {
            Operation::Insert(i) => {
                assert_eq!(oracle.contains(&i), set.contains(&i));
                set = set.insert(i);
                oracle.insert(i);
                assert!(set.contains(&i));
                assert_eq!(oracle.len(), set.size());
            }
            Operation::Remove(i) => {
                assert_eq!(oracle.contains(&i), set.contains(&i));
                set = set.remove(&i);
                oracle.remove(&i);
                assert!(!set.contains(&i));
                assert_eq!(oracle.len(), set.size());
            }
            Operation::Dump => {
                assert_eq!(oracle.len(), set.size());
                let expect: Vec<u64> = oracle.iter().copied().collect();
                let mut got: Vec<u64> = set.iter().copied().collect();
                got.sort();
                assert_eq!(expect, got);
                assert_eq!(set.size(), set.intersection_size(&set));
            }
            Operation::Merge(i) => {
                let (prev, prev_oracle) = &saved[i];
                let expect_shared = oracle.intersection(prev_oracle).count();
                assert_eq!(expect_shared, set.intersection_size(prev));
                assert_eq!(expect_shared, prev.intersection_size(&set));
                let union = set.union(prev);
                assert!(union.equal(&prev.union(&set)));
                oracle.extend(prev_oracle.iter().copied());
                set = union;
                assert_eq!(oracle.len(), set.size());
            }
            Operation::Save => {
                saved.push((set.clone(), oracle.clone()));
            }
        }
    }

    for (set, oracle) in &saved {
        assert_eq!(oracle.len(), set.size());
        for k in oracle {
            assert!(set.contains(k));
        }
    }
}

const N: usize = 1000;

pub(crate) fn insert_remove_sparse() -> impl Iterator<Item = Operation> {
    let to_insert: BTreeSet<u64> = (0..N).map(|_| rand::random::<u64>()).collect();
    let in_sequence: Vec<u64> = to_insert.into_iter().collect();
    let in_set: Vec<u64> = in_sequence[0..N / 2].to_vec();
    let not_in_set: Vec<u64> = in_sequence[N / 2..].to_vec();
    in_set
        .clone()
        .into_iter()
        .map(Operation::Insert)
        .chain(once(Operation::Dump))
        .chain(not_in_set.into_iter().map(Operation::Remove))
        .chain(once(Operation::Dump))
        .chain(in_set.into_iter().map(Operation::Remove))
        .chain(once(Operation::Dump))
}

pub(crate) fn insert_remove_dense() -> impl Iterator<Item = Operation> {
    const K: u64 = N as u64;
    (0..K)
        .map(Operation::Insert)
        .chain(once(Operation::Dump))
        .chain((0..K).map(Operation::Remove))
        .chain(once(Operation::Dump))
}

pub(crate) fn merge_no_overlap() -> impl Iterator<Item = Operation> {
    let to_insert_1 = Vec::from_iter((0..N).map(|_| rand::random::<u64>()));
    let to_insert_2 = Vec::from_iter((0..N).map(|_| rand::random::<u64>()));
    to_insert_1
        .clone()
        .into_iter()
        .map(Operation::Insert)
        .chain(once(Operation::Save))
        .chain(to_insert_1.into_iter().map(Operation::Remove))
        .chain(once(Operation::Dump))
        .chain(to_insert_2.into_iter().map(Operation::Insert))
        .chain(once(Operation::Dump))
        .chain(once(Operation::Merge(0)))
        .chain(once(Operation::Dump))
}

pub(crate) fn merge_all_overlap() -> impl Iterator<Item = Operation> {
    let to_insert = Vec::from_iter((0..N).map(|_| rand::random::<u64>()));
    to_insert
        .clone()
        .into_iter()
        .map(Operation::Insert)
        .chain(once(Operation::Save))
        .chain(once(Operation::Dump))
        .chain(to_insert.into_iter().map(Operation::Insert))
        .chain(once(Operation::Dump))
        .chain(once(Operation::Merge(0)))
        .chain(once(Operation::Dump))
}

pub(crate) fn merge_partial_overlap() -> impl Iterator<Item = Operation> {
    let to_insert_1 = Vec::from_iter((0..N).map(|_| rand::random::<u64>()));
    let mut to_insert_2 = Vec::from_iter(to_insert_1[0..N / 2].iter().copied());
    to_insert_2.extend((0..N).map(|_| rand::random::<u64>()));
    to_insert_1
        .clone()
        .into_iter()
        .map(Operation::Insert)
        .chain(once(Operation::Save))
        .chain(to_insert_1.into_iter().map(Operation::Remove))
        .chain(once(Operation::Dump))
        .chain(to_insert_2.into_iter().map(Operation::Insert))
        .chain(once(Operation::Dump))
        .chain(once(Operation::Merge(0)))
        .chain(once(Operation::Dump))
}
