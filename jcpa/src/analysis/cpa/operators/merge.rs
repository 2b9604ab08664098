use crate::analysis::cpa::lattice::JoinSemiLattice;
use crate::analysis::cpa::operators::MergeOperator;

/// Never merges: every new state is kept separately.
#[derive(Debug, Default, Copy, Clone)]
pub struct MergeSep;

impl<S> MergeOperator<S> for MergeSep {
    fn merge(&self, _new: &S, _reached: &S) -> Option<S> {
        None
    }
}

/// Replaces the reached state with the join of both states.
#[derive(Debug, Default, Copy, Clone)]
pub struct MergeJoin;

impl<S: JoinSemiLattice + Clone> MergeOperator<S> for MergeJoin {
    fn merge(&self, new: &S, reached: &S) -> Option<S> {
        if new.is_less_or_equal(reached) {
            return None;
        }
        let mut joined = reached.clone();
        joined.join(new);
        Some(joined)
    }
}
