use crate::analysis::cfa::ProgramLocation;
use crate::analysis::cpa::lattice::JoinSemiLattice;
use std::fmt::{Debug, Formatter, Result as FmtResult};

/// The successors produced by a transfer relation, evaluated lazily.
pub struct Successor<'a, T>(Box<dyn Iterator<Item = T> + 'a>);

impl<T> Debug for Successor<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("Successor { .. }")
    }
}

impl<'a, T: 'a> IntoIterator for Successor<'a, T> {
    type Item = T;
    type IntoIter = Box<dyn Iterator<Item = T> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.0
    }
}

impl<'a, T: 'a, I> From<I> for Successor<'a, T>
where
    I: Iterator<Item = T> + 'a,
{
    fn from(value: I) -> Self {
        Self(Box::new(value))
    }
}

/// Core trait for abstract states used by the CPA.
pub trait AbstractState: JoinSemiLattice + Clone + Debug {}

impl<T: JoinSemiLattice + Clone + Debug> AbstractState for T {}

/// States that know their program location.
pub trait LocationState: AbstractState {
    fn location(&self) -> &ProgramLocation;
}
