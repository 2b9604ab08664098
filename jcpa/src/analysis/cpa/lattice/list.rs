use crate::analysis::cpa::lattice::{BoundedJoinSemiLattice, JoinSemiLattice};
use std::cmp::Ordering;
use std::fmt::Debug;

/// A sequence of lattice elements accessed by index.
///
/// Lists of different lengths are compared and joined as if the shorter one were padded
/// with bottom elements at its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListAbstractState<T> {
    elements: Vec<T>,
}

impl<T> ListAbstractState<T> {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.elements.get(index)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.elements.iter_mut()
    }
}

impl<T: Clone> ListAbstractState<T> {
    pub fn get_or_default(&self, index: usize, default: T) -> T {
        self.elements.get(index).cloned().unwrap_or(default)
    }

    /// Writes `value` at `index`, growing the list with `default` if needed.
    pub fn set(&mut self, index: usize, value: T, default: T) {
        if index >= self.elements.len() {
            self.elements.resize(index, default);
            self.elements.push(value);
        } else {
            self.elements[index] = value;
        }
    }
}

impl<T> Default for ListAbstractState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for ListAbstractState<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

impl<T: JoinSemiLattice> PartialOrd for ListAbstractState<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        pointwise_cmp(self.elements.iter(), other.elements.iter())
    }
}

impl<T: JoinSemiLattice + Clone> JoinSemiLattice for ListAbstractState<T> {
    fn join(&mut self, other: &Self) {
        for (mine, theirs) in self.elements.iter_mut().zip(other.elements.iter()) {
            mine.join(theirs);
        }
        if other.elements.len() > self.elements.len() {
            let extra = &other.elements[self.elements.len()..];
            self.elements.extend_from_slice(extra);
        }
    }
}

impl<T: JoinSemiLattice + Clone> BoundedJoinSemiLattice for ListAbstractState<T> {
    fn bottom() -> Self {
        Self::new()
    }

    fn is_bottom(&self) -> bool {
        self.is_empty()
    }
}

/// Orders two sequences element by element. An element missing from one side is below the
/// element present on the other side.
pub(crate) fn pointwise_cmp<'a, T: PartialOrd + 'a>(
    a: impl ExactSizeIterator<Item = &'a T>,
    b: impl ExactSizeIterator<Item = &'a T>,
) -> Option<Ordering> {
    let mut result = a.len().cmp(&b.len());
    for (x, y) in a.zip(b) {
        match (result, x.partial_cmp(y)?) {
            (_, Ordering::Equal) => {}
            (Ordering::Equal, o) => result = o,
            (r, o) if r == o => {}
            _ => return None,
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cpa::lattice::set::SetAbstractState;

    fn list(values: &[&[u8]]) -> ListAbstractState<SetAbstractState<u8>> {
        values
            .iter()
            .map(|v| v.iter().copied().collect())
            .collect()
    }

    #[test]
    fn set_extends_with_default() {
        let mut l = ListAbstractState::new();
        l.set(3, 7u8, 0);
        assert_eq!(l.iter().copied().collect::<Vec<_>>(), vec![0, 0, 0, 7]);
        assert_eq!(l.get_or_default(10, 42), 42);
    }

    #[test]
    fn join_pads_the_shorter_list() {
        let mut a = list(&[&[1]]);
        a.join(&list(&[&[2], &[3]]));
        assert_eq!(a, list(&[&[1, 2], &[3]]));
    }

    #[test]
    fn order_is_pointwise() {
        assert!(list(&[&[1]]) < list(&[&[1, 2], &[]]));
        assert!(list(&[&[1], &[]]) > list(&[&[1]]));
        assert_eq!(list(&[&[1], &[]]).partial_cmp(&list(&[&[2]])), None);
        assert_eq!(list(&[&[1, 2]]).partial_cmp(&list(&[&[1], &[4]])), None);
    }

    #[test]
    fn lattice_laws() {
        let samples = [list(&[]), list(&[&[1]]), list(&[&[1], &[2]]), list(&[&[3]])];
        for a in &samples {
            assert!(a.is_less_or_equal(a));
            assert!(ListAbstractState::bottom().is_less_or_equal(a));
            for b in &samples {
                let mut ab = a.clone();
                ab.join(b);
                let mut ba = b.clone();
                ba.join(a);
                assert_eq!(ab, ba);
                assert!(b.is_less_or_equal(&ab));
                if a.is_less_or_equal(b) {
                    assert_eq!(&ab, b);
                }
            }
        }
    }
}
