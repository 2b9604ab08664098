//! Map-shaped abstract states. All strategies share the same lattice: join is the key-wise
//! union joining the values of common keys, and order is pointwise with a missing key standing
//! for the bottom value.

mod differential;
mod hash;
mod limited;
#[cfg(test)]
mod tests;

pub use differential::{CollapseCriterion, DifferentialMapAbstractState};
pub use hash::HashMapAbstractState;
pub use limited::{AdmissionPredicate, LimitedHashMapAbstractState, max_size};

use crate::analysis::cpa::lattice::{BoundedJoinSemiLattice, JoinSemiLattice};
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::hash::Hash;

#[derive(Clone)]
pub enum MapAbstractState<K, V> {
    Hash(HashMapAbstractState<K, V>),
    Differential(DifferentialMapAbstractState<K, V>),
    Limited(LimitedHashMapAbstractState<K, V>),
}

macro_rules! dispatch {
    ($self:expr, $map:ident => $body:expr) => {
        match $self {
            MapAbstractState::Hash($map) => $body,
            MapAbstractState::Differential($map) => $body,
            MapAbstractState::Limited($map) => $body,
        }
    };
}

impl<K: Hash + Eq + Clone, V: Clone> MapAbstractState<K, V> {
    pub fn new() -> Self {
        Self::Hash(HashMapAbstractState::new())
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        dispatch!(self, m => m.get(key))
    }

    pub fn get_or_default(&self, key: &K, default: V) -> V {
        self.get(key).cloned().unwrap_or(default)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Inserts `value` under `key`. A limited map may silently refuse the entry.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        dispatch!(self, m => m.insert(key, value))
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        dispatch!(self, m => m.remove(key))
    }

    pub fn len(&self) -> usize {
        dispatch!(self, m => m.len())
    }

    pub fn is_empty(&self) -> bool {
        dispatch!(self, m => m.is_empty())
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = (&K, &V)> + '_> {
        dispatch!(self, m => Box::new(m.iter()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    pub fn clear(&mut self) {
        dispatch!(self, m => m.clear())
    }

    /// Keeps only the entries for which `keep` returns true.
    pub fn retain<F: FnMut(&K, &V) -> bool>(&mut self, mut keep: F) {
        let doomed: Vec<K> = self
            .iter()
            .filter(|(k, v)| !keep(k, v))
            .map(|(k, _)| k.clone())
            .collect();
        for key in doomed {
            self.remove(&key);
        }
    }

    /// Replaces every value for which `update` returns a new one.
    pub fn update_values<F: FnMut(&K, &V) -> Option<V>>(&mut self, mut update: F) {
        let changed: Vec<(K, V)> = self
            .iter()
            .filter_map(|(k, v)| update(k, v).map(|n| (k.clone(), n)))
            .collect();
        for (key, value) in changed {
            self.overwrite(key, value);
        }
    }

    /// Writes over a key that is known to be present, bypassing any admission check.
    fn overwrite(&mut self, key: K, value: V) {
        match self {
            MapAbstractState::Limited(m) => m.update(key, value),
            _ => {
                self.insert(key, value);
            }
        }
    }

    fn le(&self, other: &Self) -> bool
    where
        V: BoundedJoinSemiLattice,
    {
        self.iter().all(|(k, v)| match other.get(k) {
            Some(o) => v.is_less_or_equal(o),
            None => v.is_bottom(),
        })
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Default for MapAbstractState<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Extend<(K, V)> for MapAbstractState<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Hash + Eq + Clone, V: BoundedJoinSemiLattice + Clone> PartialEq for MapAbstractState<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.le(other) && other.le(self)
    }
}

impl<K: Hash + Eq + Clone, V: BoundedJoinSemiLattice + Clone> Eq for MapAbstractState<K, V> {}

impl<K: Hash + Eq + Clone, V: BoundedJoinSemiLattice + Clone> PartialOrd for MapAbstractState<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.le(other), other.le(self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => None,
        }
    }
}

impl<K: Hash + Eq + Clone, V: BoundedJoinSemiLattice + Clone> JoinSemiLattice
    for MapAbstractState<K, V>
{
    fn join(&mut self, other: &Self) {
        for (key, theirs) in other.iter() {
            match self.get(key) {
                Some(mine) if theirs.is_less_or_equal(mine) => {}
                Some(mine) => {
                    let mut joined = mine.clone();
                    joined.join(theirs);
                    self.overwrite(key.clone(), joined);
                }
                None => {
                    self.insert(key.clone(), theirs.clone());
                }
            }
        }
    }
}

impl<K: Hash + Eq + Clone, V: BoundedJoinSemiLattice + Clone> BoundedJoinSemiLattice
    for MapAbstractState<K, V>
{
    fn bottom() -> Self {
        Self::new()
    }

    fn is_bottom(&self) -> bool {
        self.values().all(|v| v.is_bottom())
    }
}

impl<K: Debug + Hash + Eq + Clone, V: Debug + Clone> Debug for MapAbstractState<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Creates empty maps of one strategy. Analyses take one factory per map role so that the
/// strategy can be chosen independently for static fields, heaps and heap nodes.
#[derive(Clone)]
pub enum MapAbstractStateFactory<K, V> {
    Hash,
    Differential(Option<CollapseCriterion<K, V>>),
    Limited(AdmissionPredicate<K, V>),
}

impl<K: Hash + Eq + Clone, V: Clone> MapAbstractStateFactory<K, V> {
    pub fn create(&self) -> MapAbstractState<K, V> {
        match self {
            Self::Hash => MapAbstractState::Hash(HashMapAbstractState::new()),
            Self::Differential(criterion) => {
                MapAbstractState::Differential(DifferentialMapAbstractState::new(criterion.clone()))
            }
            Self::Limited(admission) => {
                MapAbstractState::Limited(LimitedHashMapAbstractState::new(admission.clone()))
            }
        }
    }

    /// A differential factory collapsing whenever a map's depth exceeds `max_depth`.
    pub fn differential_with_max_depth(max_depth: usize) -> Self
    where
        K: 'static,
        V: 'static,
    {
        Self::Differential(Some(std::sync::Arc::new(
            move |m: &DifferentialMapAbstractState<K, V>| m.depth() > max_depth,
        )))
    }
}

impl<K, V> Default for MapAbstractStateFactory<K, V> {
    fn default() -> Self {
        Self::Hash
    }
}

impl<K, V> Debug for MapAbstractStateFactory<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hash => write!(f, "Hash"),
            Self::Differential(_) => write!(f, "Differential"),
            Self::Limited(_) => write!(f, "Limited"),
        }
    }
}
