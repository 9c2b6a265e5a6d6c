use std::cmp::Ordering;

use super::GenericKey;

/// Total order over index keys.
pub trait KeyComparator<K>: Send + Sync {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Uses the key type's own `Ord`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrdComparator;

impl<K: Ord> KeyComparator<K> for OrdComparator {
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Orders generic keys by the signed integer in their leading bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntegerComparator;

impl<const N: usize> KeyComparator<GenericKey<N>> for IntegerComparator {
    fn compare(&self, a: &GenericKey<N>, b: &GenericKey<N>) -> Ordering {
        a.to_integer().cmp(&b.to_integer())
    }
}

/// Orders generic keys lexicographically by raw bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytewiseComparator;

impl<const N: usize> KeyComparator<GenericKey<N>> for BytewiseComparator {
    fn compare(&self, a: &GenericKey<N>, b: &GenericKey<N>) -> Ordering {
        a.as_bytes().cmp(b.as_bytes())
    }
}
