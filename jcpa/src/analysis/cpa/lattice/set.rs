use crate::analysis::cpa::lattice::{BoundedJoinSemiLattice, JoinSemiLattice};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::collections::hash_set::Iter;
use std::fmt::{Debug, Formatter};
use std::hash::Hash;

/// A powerset lattice: join is union, order is inclusion, bottom is the empty set.
#[derive(Clone, PartialEq, Eq)]
pub struct SetAbstractState<T: Hash + Eq> {
    elements: HashSet<T>,
}

impl<T: Hash + Eq> SetAbstractState<T> {
    pub fn new() -> Self {
        Self {
            elements: HashSet::new(),
        }
    }

    pub fn singleton(element: T) -> Self {
        Self {
            elements: HashSet::from([element]),
        }
    }

    pub fn insert(&mut self, element: T) -> bool {
        self.elements.insert(element)
    }

    pub fn remove(&mut self, element: &T) -> bool {
        self.elements.remove(element)
    }

    pub fn contains(&self, element: &T) -> bool {
        self.elements.contains(element)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, T> {
        self.elements.iter()
    }

    pub fn clear(&mut self) {
        self.elements.clear()
    }

    pub fn is_subset(&self, other: &Self) -> bool {
        self.elements.is_subset(&other.elements)
    }

    pub fn intersects(&self, other: &Self) -> bool {
        !self.elements.is_disjoint(&other.elements)
    }
}

impl<T: Hash + Eq> Default for SetAbstractState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq + Debug> Debug for SetAbstractState<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.elements.iter()).finish()
    }
}

impl<T: Hash + Eq> FromIterator<T> for SetAbstractState<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

impl<T: Hash + Eq> Extend<T> for SetAbstractState<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.elements.extend(iter)
    }
}

impl<T: Hash + Eq> IntoIterator for SetAbstractState<T> {
    type Item = T;
    type IntoIter = std::collections::hash_set::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a, T: Hash + Eq> IntoIterator for &'a SetAbstractState<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<T: Hash + Eq> PartialOrd for SetAbstractState<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.is_subset(other), other.is_subset(self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => None,
        }
    }
}

impl<T: Hash + Eq + Clone> JoinSemiLattice for SetAbstractState<T> {
    fn join(&mut self, other: &Self) {
        self.elements.extend(other.elements.iter().cloned())
    }
}

impl<T: Hash + Eq + Clone> BoundedJoinSemiLattice for SetAbstractState<T> {
    fn bottom() -> Self {
        Self::new()
    }

    fn is_bottom(&self) -> bool {
        self.is_empty()
    }
}
