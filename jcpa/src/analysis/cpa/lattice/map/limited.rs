use std::collections::HashMap;
use std::collections::hash_map::Iter;
use std::fmt::{Debug, Formatter};
use std::hash::Hash;
use std::sync::Arc;

/// Decides whether `(key, value)` may be added to the current contents of a limited map.
pub type AdmissionPredicate<K, V> = Arc<dyn Fn(&HashMap<K, V>, &K, &V) -> bool + Send + Sync>;

/// A hash map that silently drops insertions rejected by its admission predicate.
#[derive(Clone)]
pub struct LimitedHashMapAbstractState<K, V> {
    map: HashMap<K, V>,
    admission: AdmissionPredicate<K, V>,
}

impl<K: Hash + Eq, V> LimitedHashMapAbstractState<K, V> {
    pub fn new(admission: AdmissionPredicate<K, V>) -> Self {
        Self {
            map: HashMap::new(),
            admission,
        }
    }

    /// Admits keys already present and new keys while the map holds fewer than `limit`.
    pub fn with_max_size(limit: usize) -> Self
    where
        K: 'static,
        V: 'static,
    {
        Self::new(max_size(limit))
    }

    pub fn admits(&self, key: &K, value: &V) -> bool {
        (self.admission)(&self.map, key, value)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    /// Returns the replaced value. Rejected entries are dropped and yield `None`.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if self.admits(&key, &value) {
            self.map.insert(key, value)
        } else {
            tracing::trace!("limited map rejected an entry");
            None
        }
    }

    /// Overwrites a present key without consulting the predicate.
    pub(super) fn update(&mut self, key: K, value: V) {
        self.map.insert(key, value);
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.map.remove(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        self.map.iter()
    }

    pub fn clear(&mut self) {
        self.map.clear()
    }
}

pub fn max_size<K: Hash + Eq + 'static, V: 'static>(limit: usize) -> AdmissionPredicate<K, V> {
    Arc::new(move |map: &HashMap<K, V>, key: &K, _: &V| {
        map.len() < limit || map.contains_key(key)
    })
}

impl<K: Debug, V: Debug> Debug for LimitedHashMapAbstractState<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimitedHashMapAbstractState")
            .field("map", &self.map)
            .finish_non_exhaustive()
    }
}
