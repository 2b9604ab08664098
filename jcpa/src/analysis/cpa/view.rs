use crate::error::CpaError;
use std::collections::BTreeSet;
use std::collections::btree_set::Iter;

/// A read-only view of a set owned by someone else.
///
/// The mutating methods exist so that misuse is reported as
/// [`CpaError::UnsupportedOperation`] instead of going unnoticed.
#[derive(Debug, Clone, Copy)]
pub struct ReadOnlySet<'a, T> {
    inner: &'a BTreeSet<T>,
}

impl<'a, T: Ord> ReadOnlySet<'a, T> {
    pub fn new(inner: &'a BTreeSet<T>) -> Self {
        Self { inner }
    }

    pub fn contains(&self, value: &T) -> bool {
        self.inner.contains(value)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> Iter<'a, T> {
        self.inner.iter()
    }

    pub fn insert(&self, _value: T) -> Result<bool, CpaError> {
        Err(CpaError::UnsupportedOperation("insert"))
    }

    pub fn remove(&self, _value: &T) -> Result<bool, CpaError> {
        Err(CpaError::UnsupportedOperation("remove"))
    }

    pub fn clear(&self) -> Result<(), CpaError> {
        Err(CpaError::UnsupportedOperation("clear"))
    }
}

impl<'a, T> IntoIterator for ReadOnlySet<'a, T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl<T: PartialEq> PartialEq<BTreeSet<T>> for ReadOnlySet<'_, T> {
    fn eq(&self, other: &BTreeSet<T>) -> bool {
        self.inner == other
    }
}
