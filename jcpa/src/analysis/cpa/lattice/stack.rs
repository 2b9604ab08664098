use crate::analysis::cpa::lattice::list::pointwise_cmp;
use crate::analysis::cpa::lattice::{BoundedJoinSemiLattice, JoinSemiLattice};
use std::cmp::Ordering;

/// A stack of lattice elements. Stacks are aligned at their tops for comparison and join;
/// the shorter one is treated as padded with bottom elements at its base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackAbstractState<T> {
    // base first, top last
    elements: Vec<T>,
}

impl<T> StackAbstractState<T> {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
        }
    }

    pub fn push(&mut self, element: T) {
        self.elements.push(element)
    }

    pub fn push_all<I: IntoIterator<Item = T>>(&mut self, elements: I) {
        self.elements.extend(elements)
    }

    pub fn pop(&mut self) -> Option<T> {
        self.elements.pop()
    }

    pub fn pop_or_default(&mut self, default: T) -> T {
        self.elements.pop().unwrap_or(default)
    }

    /// Returns the element `index` positions below the top; `0` is the top.
    pub fn peek(&self, index: usize) -> Option<&T> {
        let len = self.elements.len();
        index
            .checked_add(1)
            .and_then(|i| len.checked_sub(i))
            .map(|i| &self.elements[i])
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn clear(&mut self) {
        self.elements.clear()
    }

    /// Iterates from the base of the stack to its top.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.elements.iter_mut()
    }
}

impl<T: Clone> StackAbstractState<T> {
    pub fn peek_or_default(&self, index: usize, default: T) -> T {
        self.peek(index).cloned().unwrap_or(default)
    }
}

impl<T> Default for StackAbstractState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for StackAbstractState<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

impl<T: JoinSemiLattice> PartialOrd for StackAbstractState<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        pointwise_cmp(self.elements.iter().rev(), other.elements.iter().rev())
    }
}

impl<T: JoinSemiLattice + Clone> JoinSemiLattice for StackAbstractState<T> {
    fn join(&mut self, other: &Self) {
        if other.elements.len() > self.elements.len() {
            let missing = other.elements.len() - self.elements.len();
            self.elements
                .splice(0..0, other.elements[..missing].iter().cloned());
        }
        for (mine, theirs) in self
            .elements
            .iter_mut()
            .rev()
            .zip(other.elements.iter().rev())
        {
            mine.join(theirs);
        }
    }
}

impl<T: JoinSemiLattice + Clone> BoundedJoinSemiLattice for StackAbstractState<T> {
    fn bottom() -> Self {
        Self::new()
    }

    fn is_bottom(&self) -> bool {
        self.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cpa::lattice::set::SetAbstractState;

    fn stack(values: &[&[u8]]) -> StackAbstractState<SetAbstractState<u8>> {
        values
            .iter()
            .map(|v| v.iter().copied().collect())
            .collect()
    }

    #[test]
    fn peek_counts_from_the_top() {
        let s: StackAbstractState<u8> = [1, 2, 3].into_iter().collect();
        assert_eq!(s.peek(0), Some(&3));
        assert_eq!(s.peek(2), Some(&1));
        assert_eq!(s.peek(3), None);
        assert_eq!(s.peek_or_default(5, 9), 9);
    }

    #[test]
    fn join_aligns_tops() {
        let mut a = stack(&[&[1]]);
        a.join(&stack(&[&[7], &[2]]));
        assert_eq!(a, stack(&[&[7], &[1, 2]]));
        assert!(stack(&[&[1]]) < stack(&[&[7], &[1]]));
        assert_eq!(stack(&[&[1], &[]]).partial_cmp(&stack(&[&[1]])), None);
    }

    #[test]
    fn lattice_laws() {
        let samples = [
            stack(&[]),
            stack(&[&[1]]),
            stack(&[&[1], &[2]]),
            stack(&[&[3]]),
        ];
        for a in &samples {
            assert!(a.is_less_or_equal(a));
            assert!(StackAbstractState::bottom().is_less_or_equal(a));
            for b in &samples {
                let mut ab = a.clone();
                ab.join(b);
                let mut ba = b.clone();
                ba.join(a);
                assert_eq!(ab, ba);
                assert!(a.is_less_or_equal(&ab));
                if a.is_less_or_equal(b) {
                    assert_eq!(&ab, b);
                }
            }
        }
    }
}
