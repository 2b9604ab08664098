use crate::analysis::cpa::lattice::{BoundedJoinSemiLattice, JoinSemiLattice};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::Hash;

#[derive(PartialEq, Eq, Clone, Hash, Debug)]
pub enum FlatLattice<C> {
    Bottom,
    Value(C),
    Top,
}

impl<C> From<C> for FlatLattice<C> {
    fn from(value: C) -> Self {
        FlatLattice::Value(value)
    }
}

impl<C: Display> Display for FlatLattice<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FlatLattice::Bottom => write!(f, "⊥"),
            FlatLattice::Value(a) => write!(f, "{a}"),
            FlatLattice::Top => write!(f, "⊤"),
        }
    }
}

impl<C> FlatLattice<C> {
    pub fn is_top(&self) -> bool {
        matches!(self, FlatLattice::Top)
    }

    pub fn value(&self) -> Option<&C> {
        match self {
            FlatLattice::Value(c) => Some(c),
            _ => None,
        }
    }
}

impl<C: PartialEq> PartialOrd for FlatLattice<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Bottom, Self::Bottom) | (Self::Top, Self::Top) => Some(Ordering::Equal),
            (Self::Bottom, _) | (_, Self::Top) => Some(Ordering::Less),
            (_, Self::Bottom) | (Self::Top, _) => Some(Ordering::Greater),
            (Self::Value(a), Self::Value(b)) => {
                if a == b {
                    Some(Ordering::Equal)
                } else {
                    None
                }
            }
        }
    }
}

impl<C: Eq + Clone> JoinSemiLattice for FlatLattice<C> {
    fn join(&mut self, other: &Self) {
        match (&self, other) {
            (_, Self::Bottom) | (Self::Top, _) => {}
            (Self::Bottom, o) => *self = o.clone(),
            (Self::Value(a), Self::Value(b)) if a == b => {}
            _ => *self = Self::Top,
        }
    }
}

impl<C: Eq + Clone> BoundedJoinSemiLattice for FlatLattice<C> {
    fn bottom() -> Self {
        Self::Bottom
    }

    fn is_bottom(&self) -> bool {
        matches!(self, Self::Bottom)
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::cpa::lattice::flat::FlatLattice;
    use crate::analysis::cpa::lattice::JoinSemiLattice;

    #[test]
    pub fn test_flat_lattice() {
        let val1 = FlatLattice::Value(4u64);
        let val2 = FlatLattice::Value(5u64);
        let top = FlatLattice::Top;
        assert_ne!(val1, val2);
        assert!(top > val1);
        assert!(FlatLattice::Bottom < val2);
        assert!(val1.partial_cmp(&val2).is_none());

        let mut joined = FlatLattice::Bottom;
        joined.join(&val1);
        assert_eq!(joined, val1);
        joined.join(&val1);
        assert_eq!(joined, val1);
        joined.join(&val2);
        assert!(joined.is_top());
    }
}
