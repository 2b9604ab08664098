pub mod algorithm;
pub mod lattice;
pub mod operators;
pub mod reached;
pub mod state;
pub mod view;
pub mod waitlist;

use crate::analysis::cpa::operators::{
    MergeOperator, MergeSep, PrecisionAdjustment, StaticPrecisionAdjustment, StopOperator,
    StopSep, TransferRelation,
};
use crate::analysis::cpa::state::AbstractState;

/**
A trait representing Configurable Program Analysis, a tunable unified framework for
dataflow and model checking algorithms. This implementation is based on the presentation of
CPA contained in Chapter 16 of
[The Handbook of Model Checking](https://link.springer.com/book/10.1007/978-3-319-10575-8)

CPA operates on abstract states, which are required to form a Lattice, specifically a
[JoinSemiLattice](lattice::JoinSemiLattice). A transfer relation produces successor states;
these can be merged with already reached states when control flow merges (potentially
losing information) or kept separate, and a stop operator decides when a new state brings
nothing new. The [algorithm](algorithm::CpaAlgorithm) terminates when no reached abstract
state produces any unreached abstract state, indicating a fixed point over the given domain.
*/
pub trait ConfigurableProgramAnalysis {
    type State: AbstractState;

    fn transfer_relation(&self) -> &dyn TransferRelation<Self::State>;

    fn merge_operator(&self) -> &dyn MergeOperator<Self::State>;

    fn stop_operator(&self) -> &dyn StopOperator<Self::State>;

    fn precision_adjustment(&self) -> &dyn PrecisionAdjustment<Self::State>;
}

/// A CPA assembled from boxed operators.
pub struct SimpleCpa<'a, S> {
    transfer: Box<dyn TransferRelation<S> + 'a>,
    merge: Box<dyn MergeOperator<S> + 'a>,
    stop: Box<dyn StopOperator<S> + 'a>,
    precision: Box<dyn PrecisionAdjustment<S> + 'a>,
}

impl<'a, S: AbstractState + 'a> SimpleCpa<'a, S> {
    /// Separate merge, covering stop and no precision adjustment.
    pub fn new<T: TransferRelation<S> + 'a>(transfer: T) -> Self {
        Self {
            transfer: Box::new(transfer),
            merge: Box::new(MergeSep),
            stop: Box::new(StopSep),
            precision: Box::new(StaticPrecisionAdjustment),
        }
    }

    pub fn with_merge<M: MergeOperator<S> + 'a>(mut self, merge: M) -> Self {
        self.merge = Box::new(merge);
        self
    }

    pub fn with_stop<T: StopOperator<S> + 'a>(mut self, stop: T) -> Self {
        self.stop = Box::new(stop);
        self
    }

    pub fn with_precision_adjustment<P: PrecisionAdjustment<S> + 'a>(mut self, precision: P) -> Self {
        self.precision = Box::new(precision);
        self
    }
}

impl<'a, S: AbstractState> ConfigurableProgramAnalysis for SimpleCpa<'a, S> {
    type State = S;

    fn transfer_relation(&self) -> &dyn TransferRelation<S> {
        self.transfer.as_ref()
    }

    fn merge_operator(&self) -> &dyn MergeOperator<S> {
        self.merge.as_ref()
    }

    fn stop_operator(&self) -> &dyn StopOperator<S> {
        self.stop.as_ref()
    }

    fn precision_adjustment(&self) -> &dyn PrecisionAdjustment<S> {
        self.precision.as_ref()
    }
}
