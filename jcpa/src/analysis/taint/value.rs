use crate::analysis::cpa::lattice::set::SetAbstractState;
use crate::analysis::cpa::lattice::{BoundedJoinSemiLattice, JoinSemiLattice, product_cmp};
use crate::analysis::jvm::JvmAbstractValue;
use crate::analysis::jvm::reference::Reference;
use crate::analysis::taint::TaintSource;
use itertools::Itertools;
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};

/// The sources a value may carry data from, and the objects it may point to.
#[derive(Clone, PartialEq, Eq)]
pub struct TaintValue {
    pub taints: SetAbstractState<TaintSource>,
    pub references: SetAbstractState<Reference>,
    padding: bool,
}

impl TaintValue {
    pub fn clean() -> Self {
        Self {
            taints: SetAbstractState::new(),
            references: SetAbstractState::new(),
            padding: false,
        }
    }

    pub fn tainted_by(source: TaintSource) -> Self {
        Self::clean().with_taints(SetAbstractState::singleton(source))
    }

    pub fn with_taints(mut self, taints: SetAbstractState<TaintSource>) -> Self {
        self.taints = taints;
        self
    }

    /// The same value with `taints` added.
    pub fn tainted(&self, taints: &SetAbstractState<TaintSource>) -> Self {
        let mut value = self.clone();
        value.taints.join(taints);
        value
    }

    pub fn is_tainted(&self) -> bool {
        !self.taints.is_empty()
    }
}

impl Debug for TaintValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.padding {
            return write!(f, "pad");
        }
        let taints = self.taints.iter().map(|t| t.to_string()).sorted().join(", ");
        write!(f, "{{{taints}}}")?;
        if !self.references.is_empty() {
            let refs = self.references.iter().map(|r| r.to_string()).sorted().join(", ");
            write!(f, " -> [{refs}]")?;
        }
        Ok(())
    }
}

impl PartialOrd for TaintValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        product_cmp(
            product_cmp(
                self.taints.partial_cmp(&other.taints),
                self.references.partial_cmp(&other.references),
            ),
            Some(other.padding.cmp(&self.padding)),
        )
    }
}

impl JoinSemiLattice for TaintValue {
    fn join(&mut self, other: &Self) {
        self.taints.join(&other.taints);
        self.references.join(&other.references);
        self.padding &= other.padding;
    }
}

impl BoundedJoinSemiLattice for TaintValue {
    fn bottom() -> Self {
        Self::padding()
    }

    fn is_bottom(&self) -> bool {
        self.padding && self.taints.is_empty() && self.references.is_empty()
    }
}

impl JvmAbstractValue for TaintValue {
    /// An unknown value carries no taint.
    fn unknown() -> Self {
        Self::clean()
    }

    fn padding() -> Self {
        Self {
            padding: true,
            ..Self::clean()
        }
    }

    fn is_padding(&self) -> bool {
        self.padding
    }

    fn references(&self) -> &SetAbstractState<Reference> {
        &self.references
    }

    fn with_references(mut self, references: SetAbstractState<Reference>) -> Self {
        self.references = references;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jcpa_bytecode::MethodSignature;

    fn source(name: &str) -> TaintSource {
        TaintSource::new(MethodSignature::new("A", name, "()I")).tainting_return()
    }

    #[test]
    fn join_unions_taints() {
        let mut a = TaintValue::tainted_by(source("a"));
        let b = TaintValue::tainted_by(source("b"));
        assert_eq!(a.partial_cmp(&b), None);
        a.join(&b);
        assert!(b.is_less_or_equal(&a));
        assert_eq!(a.taints.len(), 2);
        assert_eq!(format!("{a:?}"), "{a, b}");
        assert!(TaintValue::padding().is_less_or_equal(&TaintValue::clean()));
        assert!(TaintValue::bottom().is_less_or_equal(&b));
        assert!(!TaintValue::clean().is_bottom());
    }
}
