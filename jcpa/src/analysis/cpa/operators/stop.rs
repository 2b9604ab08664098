use crate::analysis::cpa::lattice::JoinSemiLattice;
use crate::analysis::cpa::operators::StopOperator;

/// Stops every state; only merges can change the reached set.
#[derive(Debug, Default, Copy, Clone)]
pub struct StopAlways;

impl<S> StopOperator<S> for StopAlways {
    fn stop(&self, _state: &S, _reached: &[&S]) -> bool {
        true
    }
}

/// Stops a state that is less or equal to some reached state.
#[derive(Debug, Default, Copy, Clone)]
pub struct StopSep;

impl<S: JoinSemiLattice> StopOperator<S> for StopSep {
    fn stop(&self, state: &S, reached: &[&S]) -> bool {
        reached.iter().any(|r| state.is_less_or_equal(r))
    }
}

/// Stops a state that is already in the reached set.
#[derive(Debug, Default, Copy, Clone)]
pub struct StopContained;

impl<S: PartialEq> StopOperator<S> for StopContained {
    fn stop(&self, state: &S, reached: &[&S]) -> bool {
        reached.iter().any(|r| *r == state)
    }
}

/// Never stops; useful for enumerating paths of acyclic programs.
#[derive(Debug, Default, Copy, Clone)]
pub struct StopNever;

impl<S> StopOperator<S> for StopNever {
    fn stop(&self, _state: &S, _reached: &[&S]) -> bool {
        false
    }
}
