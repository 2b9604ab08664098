use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::hash::Hash;
use std::sync::Arc;

/// Decides, after every mutation, whether a differential map should collapse its delta.
pub type CollapseCriterion<K, V> =
    Arc<dyn Fn(&DifferentialMapAbstractState<K, V>) -> bool + Send + Sync>;

/// A copy-on-write map: a shared, immutable base snapshot plus a private delta.
///
/// Cloning only copies the delta. `depth` counts the insertions and removals recorded in
/// the delta since the last [`collapse`](Self::collapse), which folds the delta into a
/// fresh base.
#[derive(Clone)]
pub struct DifferentialMapAbstractState<K, V> {
    base: Arc<HashMap<K, V>>,
    // `None` marks a key removed from the base
    delta: HashMap<K, Option<V>>,
    depth: usize,
    collapse_criterion: Option<CollapseCriterion<K, V>>,
}

impl<K: Hash + Eq + Clone, V: Clone> DifferentialMapAbstractState<K, V> {
    pub fn new(collapse_criterion: Option<CollapseCriterion<K, V>>) -> Self {
        Self {
            base: Arc::new(HashMap::new()),
            delta: HashMap::new(),
            depth: 0,
            collapse_criterion,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        match self.delta.get(key) {
            Some(entry) => entry.as_ref(),
            None => self.base.get(key),
        }
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let old = self.get(&key).cloned();
        self.delta.insert(key, Some(value));
        self.mutated();
        old
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let old = self.get(key).cloned();
        if self.base.contains_key(key) {
            self.delta.insert(key.clone(), None);
        } else {
            self.delta.remove(key);
        }
        self.mutated();
        old
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        let shadowed = &self.delta;
        self.base
            .iter()
            .filter(move |(k, _)| !shadowed.contains_key(*k))
            .chain(
                self.delta
                    .iter()
                    .filter_map(|(k, v)| v.as_ref().map(|v| (k, v))),
            )
    }

    pub fn clear(&mut self) {
        self.base = Arc::new(HashMap::new());
        self.delta.clear();
        self.depth = 0;
    }

    /// Materializes base and delta into a new base snapshot.
    pub fn collapse(&mut self) {
        if !self.delta.is_empty() {
            let merged: HashMap<K, V> = self
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            self.base = Arc::new(merged);
            self.delta.clear();
        }
        self.depth = 0;
    }

    fn mutated(&mut self) {
        self.depth += 1;
        let collapse = match &self.collapse_criterion {
            Some(criterion) => criterion(&*self),
            None => false,
        };
        if collapse {
            tracing::trace!(depth = self.depth, "collapsing differential map");
            self.collapse();
        }
    }
}

impl<K: Debug, V: Debug> Debug for DifferentialMapAbstractState<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DifferentialMapAbstractState")
            .field("base", &self.base)
            .field("delta", &self.delta)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}
