use std::collections::HashMap;
use std::collections::hash_map::Iter;
use std::hash::Hash;

/// The plain map strategy: a mutable hash map.
#[derive(Debug, Clone)]
pub struct HashMapAbstractState<K, V> {
    map: HashMap<K, V>,
}

impl<K: Hash + Eq, V> HashMapAbstractState<K, V> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.map.insert(key, value)
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

impl<K: Hash + Eq, V> Default for HashMapAbstractState<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, V: PartialEq> PartialEq for HashMapAbstractState<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<K: Hash + Eq, V: Eq> Eq for HashMapAbstractState<K, V> {}
