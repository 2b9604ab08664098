use crate::analysis::cpa::lattice::JoinSemiLattice;
use crate::analysis::cpa::lattice::set::SetAbstractState;
use crate::analysis::jvm::JvmAbstractValue;
use crate::analysis::jvm::heap::{FieldKey, JvmHeap};
use crate::analysis::jvm::reference::Reference;
use jcpa_bytecode::ValueKind;

/// A heap that remembers nothing: writes are dropped and reads are unknown.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd)]
pub struct ForgetfulHeap;

impl JoinSemiLattice for ForgetfulHeap {
    fn join(&mut self, _: &Self) {}
}

impl<V: JvmAbstractValue> JvmHeap<V> for ForgetfulHeap {
    fn new_object(&mut self, _: Reference) {}

    fn new_array(&mut self, _: Reference, _: ValueKind) {}

    fn get_field(&self, _: &V, _: &str) -> Option<V> {
        None
    }

    fn set_field(&mut self, _: &V, _: &str, _: V) {}

    fn get_array(&self, _: &V, _: ValueKind) -> Option<V> {
        None
    }

    fn set_array(&mut self, _: &V, _: ValueKind, _: V) {}

    fn value_at(&self, _: &Reference, _: &FieldKey) -> Option<V> {
        None
    }

    fn reduce(&mut self, _: &SetAbstractState<Reference>) {}

    fn expand(&mut self, _: &Self) {}
}
