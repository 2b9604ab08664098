use crate::analysis::cfa::ProgramLocation;
use crate::analysis::cpa::state::LocationState;
use std::collections::{BTreeMap, VecDeque};

/// The states still to be explored, and the order in which they are explored.
pub trait Waitlist<S> {
    fn add(&mut self, state: S);

    fn pop(&mut self) -> Option<S>;

    /// Removes one occurrence of `state`, returning whether it was present.
    fn remove(&mut self, state: &S) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// The waiting states, in no particular order.
    fn snapshot(&self) -> Vec<S>;
}

/// Last in, first out.
#[derive(Debug, Clone)]
pub struct DepthFirstWaitlist<S>(Vec<S>);

/// First in, first out.
#[derive(Debug, Clone)]
pub struct BreadthFirstWaitlist<S>(VecDeque<S>);

impl<S> Default for DepthFirstWaitlist<S> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<S> Default for BreadthFirstWaitlist<S> {
    fn default() -> Self {
        Self(VecDeque::new())
    }
}

impl<S: PartialEq + Clone> Waitlist<S> for DepthFirstWaitlist<S> {
    fn add(&mut self, state: S) {
        self.0.push(state)
    }

    fn pop(&mut self) -> Option<S> {
        self.0.pop()
    }

    fn remove(&mut self, state: &S) -> bool {
        match self.0.iter().rposition(|s| s == state) {
            Some(i) => {
                self.0.remove(i);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn clear(&mut self) {
        self.0.clear()
    }

    fn snapshot(&self) -> Vec<S> {
        self.0.clone()
    }
}

impl<S: PartialEq + Clone> Waitlist<S> for BreadthFirstWaitlist<S> {
    fn add(&mut self, state: S) {
        self.0.push_back(state)
    }

    fn pop(&mut self) -> Option<S> {
        self.0.pop_front()
    }

    fn remove(&mut self, state: &S) -> bool {
        match self.0.iter().position(|s| s == state) {
            Some(i) => self.0.remove(i).is_some(),
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn clear(&mut self) {
        self.0.clear()
    }

    fn snapshot(&self) -> Vec<S> {
        self.0.iter().cloned().collect()
    }
}

/// Explores the smallest program location first, and states at the same location in the
/// order they were added. Within a method this visits code roughly in offset order, which
/// lets joins at merge points happen before the merged state is explored further.
#[derive(Debug, Clone)]
pub struct ProgramLocationWaitlist<S> {
    by_location: BTreeMap<ProgramLocation, VecDeque<S>>,
    len: usize,
}

impl<S> Default for ProgramLocationWaitlist<S> {
    fn default() -> Self {
        Self {
            by_location: BTreeMap::new(),
            len: 0,
        }
    }
}

impl<S: LocationState> Waitlist<S> for ProgramLocationWaitlist<S> {
    fn add(&mut self, state: S) {
        self.by_location
            .entry(state.location().clone())
            .or_default()
            .push_back(state);
        self.len += 1;
    }

    fn pop(&mut self) -> Option<S> {
        let mut entry = self.by_location.first_entry()?;
        let state = entry.get_mut().pop_front();
        if entry.get().is_empty() {
            entry.remove();
        }
        if state.is_some() {
            self.len -= 1;
        }
        state
    }

    fn remove(&mut self, state: &S) -> bool {
        let Some(queue) = self.by_location.get_mut(state.location()) else {
            return false;
        };
        let Some(i) = queue.iter().position(|s| s == state) else {
            return false;
        };
        queue.remove(i);
        if queue.is_empty() {
            self.by_location.remove(state.location());
        }
        self.len -= 1;
        true
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        self.by_location.clear();
        self.len = 0;
    }

    fn snapshot(&self) -> Vec<S> {
        self.by_location.values().flatten().cloned().collect()
    }
}
