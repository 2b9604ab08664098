use crate::analysis::cpa::operators::AbortOperator;
use std::cell::Cell;

#[derive(Debug, Default, Copy, Clone)]
pub struct NeverAbort;

impl AbortOperator for NeverAbort {
    fn should_abort(&self) -> bool {
        false
    }
}

/// Aborts once it has been polled more than `limit` times.
#[derive(Debug)]
pub struct IterationLimit {
    limit: usize,
    polled: Cell<usize>,
}

impl IterationLimit {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            polled: Cell::new(0),
        }
    }

    pub fn polled(&self) -> usize {
        self.polled.get()
    }
}

impl AbortOperator for IterationLimit {
    fn should_abort(&self) -> bool {
        let polled = self.polled.get() + 1;
        self.polled.set(polled);
        polled > self.limit
    }
}
