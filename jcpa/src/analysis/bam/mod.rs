//! Block abstraction memoization: an interprocedural CPA that analyzes each method body
//! separately, once per reduced entry state, and reuses the result at every call site
//! with a covered entry state.

mod cache;
mod operators;
#[cfg(test)]
mod tests;

pub use cache::{BamCache, BamCacheEntry, BlockAbstraction};
pub use operators::{
    ExpandOperator, JvmDefaultExpandOperator, JvmDefaultReduceOperator, ReduceOperator,
};

use crate::analysis::cfa::{Call, JvmCfa, ProgramLocation};
use crate::analysis::cpa::ConfigurableProgramAnalysis;
use crate::analysis::cpa::lattice::JoinSemiLattice;
use crate::analysis::cpa::algorithm::CpaAlgorithm;
use crate::analysis::cpa::operators::{
    AbortOperator, MergeJoin, MergeOperator, MergeSep, NeverAbort, PrecisionAdjustment,
    StaticPrecisionAdjustment, StopOperator, StopSep, TransferRelation,
};
use crate::analysis::cpa::reached::{ProgramLocationDependentReachedSet, ReachedSet};
use crate::analysis::cpa::state::{LocationState, Successor};
use crate::analysis::cpa::waitlist::{ProgramLocationWaitlist, Waitlist};
use crate::analysis::jvm::heap::JvmHeap;
use crate::analysis::jvm::state::JvmAbstractState;
use crate::analysis::jvm::transfer::JvmTransferRelation;
use crate::analysis::jvm::{JvmAbstractValue, ValueSemantics};
use jcpa_bytecode::MethodSignature;
use std::cell::{Cell, Ref, RefCell};
use tracing::{debug, instrument, trace};

/// The interprocedural CPA. It is its own transfer relation: at call sites it reduces the
/// state, looks up or computes the callee's block and expands the exit states; everywhere
/// else it defers to the intraprocedural transfer relation.
///
/// Calls re-entering an analysis in progress further up the call stack with a covered
/// entry state, and calls beyond the maximum call stack depth, are left to the
/// intraprocedural relation, which treats them as opaque. A recursive call with a new entry
/// state is analyzed from that state joined with the entry in progress.
pub struct BamCpa<'a, S> {
    cfa: &'a JvmCfa,
    intraprocedural: Box<dyn TransferRelation<S> + 'a>,
    reduce: Box<dyn ReduceOperator<S> + 'a>,
    expand: Box<dyn ExpandOperator<S> + 'a>,
    merge: Box<dyn MergeOperator<S> + 'a>,
    stop: Box<dyn StopOperator<S> + 'a>,
    precision: Box<dyn PrecisionAdjustment<S> + 'a>,
    abort: Box<dyn AbortOperator + 'a>,
    /// Negative for no limit.
    max_call_stack_depth: i32,
    cache: RefCell<BamCache<S>>,
    call_stack: RefCell<Vec<(MethodSignature, S)>>,
    aborted: Cell<bool>,
    iterations: Cell<usize>,
}

impl<'a, S: LocationState + 'a> BamCpa<'a, S> {
    pub fn new<T, R, E>(cfa: &'a JvmCfa, intraprocedural: T, reduce: R, expand: E) -> Self
    where
        T: TransferRelation<S> + 'a,
        R: ReduceOperator<S> + 'a,
        E: ExpandOperator<S> + 'a,
    {
        Self {
            cfa,
            intraprocedural: Box::new(intraprocedural),
            reduce: Box::new(reduce),
            expand: Box::new(expand),
            merge: Box::new(MergeSep),
            stop: Box::new(StopSep),
            precision: Box::new(StaticPrecisionAdjustment),
            abort: Box::new(NeverAbort),
            max_call_stack_depth: -1,
            cache: RefCell::new(BamCache::new()),
            call_stack: RefCell::new(Vec::new()),
            aborted: Cell::new(false),
            iterations: Cell::new(0),
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

    pub fn with_abort<A: AbortOperator + 'a>(mut self, abort: A) -> Self {
        self.abort = Box::new(abort);
        self
    }

    pub fn with_boxed_abort(mut self, abort: Box<dyn AbortOperator + 'a>) -> Self {
        self.abort = abort;
        self
    }

    pub fn with_max_call_stack_depth(mut self, depth: i32) -> Self {
        self.max_call_stack_depth = depth;
        self
    }

    /// Analyzes `signature` from `entry` to a fixed point, caches the block and returns the
    /// states reached at the method's exit.
    #[instrument(skip_all, fields(method = %signature))]
    pub fn analyze_block(&self, signature: MethodSignature, entry: S) -> Vec<S> {
        self.call_stack.borrow_mut().push((signature, entry.clone()));
        let mut reached = ProgramLocationDependentReachedSet::new();
        let mut waitlist = ProgramLocationWaitlist::default();
        reached.add(entry.clone());
        waitlist.add(entry.clone());
        let outcome = CpaAlgorithm::new(self).run(&mut reached, &mut waitlist, self.abort.as_ref());
        self.call_stack.borrow_mut().pop();
        self.iterations.set(self.iterations.get() + outcome.iterations);
        if outcome.aborted {
            self.aborted.set(true);
        }
        let exits: Vec<S> = reached
            .states_at(&ProgramLocation::Exit(signature))
            .cloned()
            .collect();
        debug!(
            reached = reached.len(),
            exits = exits.len(),
            aborted = outcome.aborted,
            "analyzed block"
        );
        let block = BlockAbstraction {
            reached,
            waitlist: waitlist.snapshot(),
        };
        self.cache.borrow_mut().put(signature, entry, None, block);
        exits
    }

    pub fn cache(&self) -> Ref<'_, BamCache<S>> {
        self.cache.borrow()
    }

    pub fn into_cache(self) -> BamCache<S> {
        self.cache.into_inner()
    }

    /// Drops every cached block, typically at the end of a top-level run.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Whether any block analysis was cut short by the abort operator.
    pub fn aborted(&self) -> bool {
        self.aborted.get()
    }

    /// Iterations of the CPA algorithm summed over all block analyses.
    pub fn iterations(&self) -> usize {
        self.iterations.get()
    }

    fn may_enter(&self) -> bool {
        self.max_call_stack_depth < 0
            || self.call_stack.borrow().len() <= self.max_call_stack_depth as usize
    }

    /// The successors of `state` through the analyzed body of `call`, or `None` if the
    /// call has to be treated as opaque.
    fn call(&self, state: &S, call: &Call) -> Option<Vec<S>> {
        let mut entry = self.reduce.reduce(state, call);
        let active = self
            .call_stack
            .borrow()
            .iter()
            .rev()
            .find(|(sig, _)| *sig == call.target)
            .map(|(_, active)| active.clone());
        if let Some(active) = active {
            if entry.is_less_or_equal(&active) {
                trace!(target = %call.target, "recursive call left opaque");
                return None;
            }
            // nested entries of one method only grow, so recursion bottoms out
            entry.join(&active);
        }
        let cached: Option<Vec<S>> = self
            .cache
            .borrow()
            .get(&call.target, &entry, None)
            .map(|block| block.exit_states(call.target).cloned().collect());
        let exits = match cached {
            Some(exits) => {
                trace!(target = %call.target, "block cache hit");
                exits
            }
            None => self.analyze_block(call.target, entry),
        };
        Some(
            exits
                .iter()
                .map(|exit| self.expand.expand(state, exit, call))
                .collect(),
        )
    }
}

impl<'a, V, H> BamCpa<'a, JvmAbstractState<V, H>>
where
    V: JvmAbstractValue + 'a,
    H: JvmHeap<V> + 'a,
{
    /// The JVM configuration: instruction transfer, default reduce and expand, joining
    /// states at equal locations.
    pub fn jvm<M: ValueSemantics<V>>(cfa: &'a JvmCfa, semantics: &'a M, reduce_heap: bool) -> Self {
        BamCpa::new(
            cfa,
            JvmTransferRelation::new(cfa, semantics),
            JvmDefaultReduceOperator::new(reduce_heap),
            JvmDefaultExpandOperator::new(semantics),
        )
        .with_merge(MergeJoin)
        .with_stop(StopSep)
    }
}

impl<S: LocationState> TransferRelation<S> for BamCpa<'_, S> {
    fn successors<'b>(&'b self, state: &'b S) -> Successor<'b, S> {
        let calls: Vec<Call> = self
            .cfa
            .call_edges_from(state.location())
            .cloned()
            .collect();
        if calls.is_empty() || !self.may_enter() {
            return self.intraprocedural.successors(state);
        }
        let mut successors = Vec::new();
        let mut opaque = false;
        for call in &calls {
            match self.call(state, call) {
                Some(states) => successors.extend(states),
                None => opaque = true,
            }
        }
        if opaque {
            successors.extend(self.intraprocedural.successors(state));
        }
        successors.into_iter().into()
    }
}

impl<S: LocationState> ConfigurableProgramAnalysis for BamCpa<'_, S> {
    type State = S;

    fn transfer_relation(&self) -> &dyn TransferRelation<S> {
        self
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
