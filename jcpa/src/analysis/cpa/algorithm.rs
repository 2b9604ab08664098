use crate::analysis::cpa::ConfigurableProgramAnalysis;
use crate::analysis::cpa::operators::AbortOperator;
use crate::analysis::cpa::reached::ReachedSet;
use crate::analysis::cpa::waitlist::Waitlist;
use tracing::{debug, trace};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CpaRunOutcome {
    pub iterations: usize,
    /// The abort operator ended the run before the waitlist was empty.
    pub aborted: bool,
}

/// The worklist fixpoint algorithm, parameterized by the operators of a CPA.
///
/// Convergence is the responsibility of the operators: the loop itself only stops when the
/// waitlist is empty or the abort operator says so.
pub struct CpaAlgorithm<'a, C: ?Sized> {
    cpa: &'a C,
}

impl<'a, C: ConfigurableProgramAnalysis + ?Sized> CpaAlgorithm<'a, C> {
    pub fn new(cpa: &'a C) -> Self {
        Self { cpa }
    }

    pub fn run(
        &self,
        reached: &mut dyn ReachedSet<C::State>,
        waitlist: &mut dyn Waitlist<C::State>,
        abort: &dyn AbortOperator,
    ) -> CpaRunOutcome {
        let transfer = self.cpa.transfer_relation();
        let merge = self.cpa.merge_operator();
        let stop = self.cpa.stop_operator();
        let precision = self.cpa.precision_adjustment();
        let mut iterations = 0;
        while !waitlist.is_empty() {
            if abort.should_abort() {
                debug!(iterations, waiting = waitlist.len(), "cpa run aborted");
                return CpaRunOutcome {
                    iterations,
                    aborted: true,
                };
            }
            let Some(state) = waitlist.pop() else {
                break;
            };
            iterations += 1;
            for successor in transfer.successors(&state) {
                let successor = precision.adjust(successor);
                let merges: Vec<_> = reached
                    .reached_for(&successor)
                    .into_iter()
                    .filter_map(|r| merge.merge(&successor, r).map(|m| (r.clone(), m)))
                    .collect();
                for (old, merged) in merges {
                    trace!(?old, ?merged, "merged reached state");
                    reached.replace(&old, merged.clone());
                    waitlist.remove(&old);
                    waitlist.add(merged);
                }
                if !stop.stop(&successor, &reached.reached_for(&successor)) {
                    reached.add(successor.clone());
                    waitlist.add(successor);
                }
            }
        }
        debug!(iterations, reached = reached.len(), "cpa run finished");
        CpaRunOutcome {
            iterations,
            aborted: false,
        }
    }
}
