use crate::analysis::cfa::ProgramLocation;
use crate::analysis::cpa::state::LocationState;
use std::collections::HashMap;
use std::fmt::Debug;

/// The states found so far by a run of the CPA algorithm.
///
/// Implementations keep states in insertion order; a replaced state keeps the position of
/// the state it replaces, so iteration and merge order are deterministic.
pub trait ReachedSet<S> {
    fn add(&mut self, state: S);

    /// Replaces `old` by `new`, returning whether `old` was present.
    fn replace(&mut self, old: &S, new: S) -> bool;

    /// The states `state` may be merged with or covered by.
    fn reached_for(&self, state: &S) -> Vec<&S>;

    fn states(&self) -> Box<dyn Iterator<Item = &S> + '_>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, state: &S) -> bool;
}

/// Every reached state is a merge and stop candidate for every new state.
#[derive(Debug, Clone)]
pub struct DefaultReachedSet<S> {
    states: Vec<S>,
}

impl<S> DefaultReachedSet<S> {
    pub fn new() -> Self {
        Self { states: Vec::new() }
    }

    pub fn into_states(self) -> Vec<S> {
        self.states
    }
}

impl<S> Default for DefaultReachedSet<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> FromIterator<S> for DefaultReachedSet<S> {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            states: iter.into_iter().collect(),
        }
    }
}

impl<S: PartialEq> ReachedSet<S> for DefaultReachedSet<S> {
    fn add(&mut self, state: S) {
        self.states.push(state)
    }

    fn replace(&mut self, old: &S, new: S) -> bool {
        match self.states.iter().position(|s| s == old) {
            Some(i) => {
                self.states[i] = new;
                true
            }
            None => false,
        }
    }

    fn reached_for(&self, _state: &S) -> Vec<&S> {
        self.states.iter().collect()
    }

    fn states(&self) -> Box<dyn Iterator<Item = &S> + '_> {
        Box::new(self.states.iter())
    }

    fn len(&self) -> usize {
        self.states.len()
    }

    fn contains(&self, state: &S) -> bool {
        self.states.contains(state)
    }
}

/// Only states at the same program location are merge and stop candidates.
#[derive(Debug, Clone)]
pub struct ProgramLocationDependentReachedSet<S> {
    states: Vec<S>,
    by_location: HashMap<ProgramLocation, Vec<usize>>,
}

impl<S: LocationState> ProgramLocationDependentReachedSet<S> {
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            by_location: HashMap::new(),
        }
    }

    pub fn states_at<'a>(
        &'a self,
        location: &ProgramLocation,
    ) -> impl Iterator<Item = &'a S> + use<'a, S> {
        self.by_location
            .get(location)
            .into_iter()
            .flatten()
            .map(|i| &self.states[*i])
    }

    pub fn locations(&self) -> impl Iterator<Item = &ProgramLocation> {
        self.by_location.keys()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, S> {
        self.states.iter()
    }

    pub fn into_states(self) -> Vec<S> {
        self.states
    }
}

impl<S: LocationState> Default for ProgramLocationDependentReachedSet<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: LocationState> ReachedSet<S> for ProgramLocationDependentReachedSet<S> {
    fn add(&mut self, state: S) {
        self.by_location
            .entry(state.location().clone())
            .or_default()
            .push(self.states.len());
        self.states.push(state)
    }

    fn replace(&mut self, old: &S, new: S) -> bool {
        assert_eq!(
            old.location(),
            new.location(),
            "a reached state may only be replaced by a state at the same location"
        );
        let found = self
            .by_location
            .get(old.location())
            .and_then(|indices| indices.iter().copied().find(|i| &self.states[*i] == old));
        match found {
            Some(i) => {
                self.states[i] = new;
                true
            }
            None => false,
        }
    }

    fn reached_for(&self, state: &S) -> Vec<&S> {
        self.states_at(state.location()).collect()
    }

    fn states(&self) -> Box<dyn Iterator<Item = &S> + '_> {
        Box::new(self.states.iter())
    }

    fn len(&self) -> usize {
        self.states.len()
    }

    fn contains(&self, state: &S) -> bool {
        self.states_at(state.location()).any(|s| s == state)
    }
}
