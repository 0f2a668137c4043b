//! The hashing contract the trees consume, plus built-in hashers.

use std::hash::{Hash, Hasher as _};
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHasher;

/// A hash function and an equality relation over keys of type `K`.
///
/// `hash` must be deterministic for as long as a key is stored in any live
/// tree, and `equal` must be an equivalence relation consistent with it:
/// `equal(a, b)` implies `hash(a) == hash(b)`. The trees call `hash` at
/// most once per lookup, insertion, or removal.
///
/// A hasher that breaks this contract does not raise errors; lookups just
/// start disagreeing with the insertion history. A hasher that merely
/// hashes poorly only costs throughput: colliding keys land in a shared
/// bucket and are told apart with `equal`.
pub trait Hasher<K> {
    fn hash(&self, key: &K) -> u64;
    fn equal(&self, a: &K, b: &K) -> bool;
}

/// Hashes any `Hash + Eq` key with [`rustc_hash::FxHasher`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DefaultHasher;

impl<K: Hash + Eq> Hasher<K> for DefaultHasher {
    fn hash(&self, key: &K) -> u64 {
        let mut state = FxHasher::default();
        key.hash(&mut state);
        state.finish()
    }

    fn equal(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// The identity hash on primitive integers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NumericHasher;

macro_rules! impl_numeric_hasher {
    ($($ty:ty),* $(,)?) => {$(
        impl Hasher<$ty> for NumericHasher {
            fn hash(&self, key: &$ty) -> u64 {
                *key as u64
            }

            fn equal(&self, a: &$ty, b: &$ty) -> bool {
                a == b
            }
        }
    )*};
}

impl_numeric_hasher!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

/// Rotate-and-xor over the bytes of a string-like key.
///
/// Weak on purpose: rotating by two keeps even and odd bit positions from
/// ever mixing. Good enough for tests and small keyspaces; prefer
/// [`DefaultHasher`] elsewhere.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StringHasher;

impl<S: AsRef<str>> Hasher<S> for StringHasher {
    fn hash(&self, key: &S) -> u64 {
        let mut hash = 0u64;
        for byte in key.as_ref().bytes() {
            hash = hash.rotate_left(2) ^ u64::from(byte);
        }
        hash
    }

    fn equal(&self, a: &S, b: &S) -> bool {
        a.as_ref() == b.as_ref()
    }
}

/// Hashes shared pointers by address and compares them by identity: two
/// keys are the same exactly when they are the same allocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PtrHasher;

impl<T> Hasher<Rc<T>> for PtrHasher {
    fn hash(&self, key: &Rc<T>) -> u64 {
        Rc::as_ptr(key) as u64
    }

    fn equal(&self, a: &Rc<T>, b: &Rc<T>) -> bool {
        Rc::ptr_eq(a, b)
    }
}

impl<T> Hasher<Arc<T>> for PtrHasher {
    fn hash(&self, key: &Arc<T>) -> u64 {
        Arc::as_ptr(key) as u64
    }

    fn equal(&self, a: &Arc<T>, b: &Arc<T>) -> bool {
        Arc::ptr_eq(a, b)
    }
}
