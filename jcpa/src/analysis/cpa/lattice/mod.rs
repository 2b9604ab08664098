use std::cmp::Ordering;

pub mod flat;
pub mod list;
pub mod map;
pub mod set;
pub mod stack;

/// A partially ordered set in which every pair of elements has a least upper bound.
///
/// The ordering is the one given by [`PartialOrd`]; `join` must agree with it, that is
/// `a <= a.join(b)` and `b <= a.join(b)` must always hold.
pub trait JoinSemiLattice: Eq + PartialOrd {
    fn join(&mut self, other: &Self);

    fn is_less_or_equal(&self, other: &Self) -> bool {
        matches!(
            self.partial_cmp(other),
            Some(Ordering::Less) | Some(Ordering::Equal)
        )
    }
}

/// A [`JoinSemiLattice`] with a least element.
pub trait BoundedJoinSemiLattice: JoinSemiLattice + Sized {
    fn bottom() -> Self;

    fn is_bottom(&self) -> bool;
}

/// Combines the orderings of two components of a product lattice.
pub(crate) fn product_cmp(a: Option<Ordering>, b: Option<Ordering>) -> Option<Ordering> {
    match (a?, b?) {
        (Ordering::Equal, o) | (o, Ordering::Equal) => Some(o),
        (x, y) if x == y => Some(x),
        _ => None,
    }
}
