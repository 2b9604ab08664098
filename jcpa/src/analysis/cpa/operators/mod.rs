//! The pluggable operators of a configurable program analysis.
//!
//! The algorithm only ever sees these traits as trait objects, so new policies can be added
//! without touching it.

mod abort;
mod merge;
mod precision;
mod stop;

pub use abort::{IterationLimit, NeverAbort};
pub use merge::{MergeJoin, MergeSep};
pub use precision::StaticPrecisionAdjustment;
pub use stop::{StopAlways, StopContained, StopNever, StopSep};

use crate::analysis::cpa::state::Successor;

/// Computes the abstract successors of a state.
pub trait TransferRelation<S> {
    fn successors<'a>(&'a self, state: &'a S) -> Successor<'a, S>;
}

impl<S: Clone, F> TransferRelation<S> for F
where
    F: Fn(&S) -> Vec<S>,
{
    fn successors<'a>(&'a self, state: &'a S) -> Successor<'a, S> {
        self(state).into_iter().into()
    }
}

/// Combines a freshly computed state with a state already in the reached set.
pub trait MergeOperator<S> {
    /// Returns the state that should replace `reached`, or `None` to leave it untouched.
    fn merge(&self, new: &S, reached: &S) -> Option<S>;
}

/// Decides whether a state is covered by the reached set and need not be explored.
pub trait StopOperator<S> {
    fn stop(&self, state: &S, reached: &[&S]) -> bool;
}

pub trait PrecisionAdjustment<S> {
    fn adjust(&self, state: S) -> S;
}

/// Polled once per iteration of the algorithm; returning true ends the run early, leaving
/// a partial reached set behind.
pub trait AbortOperator {
    fn should_abort(&self) -> bool;
}

impl<F: Fn() -> bool> AbortOperator for F {
    fn should_abort(&self) -> bool {
        self()
    }
}
