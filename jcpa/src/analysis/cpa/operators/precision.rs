use crate::analysis::cpa::operators::PrecisionAdjustment;

/// Leaves states unchanged.
#[derive(Debug, Default, Copy, Clone)]
pub struct StaticPrecisionAdjustment;

impl<S> PrecisionAdjustment<S> for StaticPrecisionAdjustment {
    fn adjust(&self, state: S) -> S {
        state
    }
}
