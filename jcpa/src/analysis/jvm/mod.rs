//! Abstract interpretation of JVM bytecode: frames, heaps, states and the intraprocedural
//! transfer relation, generic over the abstract value domain.

pub mod frame;
pub mod heap;
pub mod reference;
pub mod state;
#[cfg(test)]
mod tests;
pub mod transfer;

use crate::analysis::cfa::Call;
use crate::analysis::cpa::lattice::BoundedJoinSemiLattice;
use crate::analysis::cpa::lattice::set::SetAbstractState;
use crate::analysis::cpa::state::AbstractState;
use crate::analysis::jvm::heap::JvmHeap;
use crate::analysis::jvm::reference::Reference;
use crate::analysis::jvm::state::JvmAbstractState;
use jcpa_bytecode::{ArithmeticOp, Constant, Instruction, ValueKind};

/// A value stored in a frame slot, a field or a static field. The bottom value is the one a
/// map holds for a key it has no entry for.
pub trait JvmAbstractValue: AbstractState + BoundedJoinSemiLattice {
    /// A value nothing is known about.
    fn unknown() -> Self;

    /// The filler occupying the second slot of a category-2 value.
    fn padding() -> Self;

    fn is_padding(&self) -> bool;

    /// The objects this value may point to.
    fn references(&self) -> &SetAbstractState<Reference>;

    fn with_references(self, references: SetAbstractState<Reference>) -> Self;
}

/// The receiver and arguments of a call, in declaration order.
#[derive(Debug, Clone)]
pub struct InvocationValues<V> {
    pub receiver: Option<V>,
    pub arguments: Vec<V>,
}

impl<V> InvocationValues<V> {
    /// The argument at a 1-based position.
    pub fn argument(&self, position: usize) -> Option<&V> {
        position.checked_sub(1).and_then(|i| self.arguments.get(i))
    }

    /// The receiver followed by the arguments.
    pub fn all(&self) -> impl Iterator<Item = &V> {
        self.receiver.iter().chain(self.arguments.iter())
    }
}

/// What instructions compute, for one value domain.
///
/// Everything the transfer relation does not delegate here (moving values between the
/// stack, locals, fields and static fields) is independent of the domain.
pub trait ValueSemantics<V: JvmAbstractValue> {
    fn constant(&self, constant: &Constant) -> V;

    fn unknown(&self, _kind: ValueKind) -> V {
        V::unknown()
    }

    fn new_reference(&self, reference: Reference) -> V {
        V::unknown().with_references(SetAbstractState::singleton(reference))
    }

    fn arithmetic(&self, op: ArithmeticOp, kind: ValueKind, left: &V, right: &V) -> V;

    /// Negations, conversions, `arraylength` and `instanceof`.
    fn unary(&self, instruction: &Instruction, operand: &V) -> V;

    fn compare(&self, kind: ValueKind, left: &V, right: &V) -> V;

    fn increment(&self, value: &V, delta: i32) -> V;

    /// The effect of a call whose body is not analyzed. `result` is an unknown value of
    /// the return kind, `None` for `void` methods. The returned value is pushed.
    fn invoke_unknown<H: JvmHeap<V>>(
        &self,
        _state: &mut JvmAbstractState<V, H>,
        _call: &Call,
        _values: &InvocationValues<V>,
        result: Option<V>,
    ) -> Option<V> {
        result
    }

    /// Applied to the caller's state after the analyzed body of a call returned `result`.
    /// `exit` is the callee's state at its exit.
    fn after_call<H: JvmHeap<V>>(
        &self,
        _state: &mut JvmAbstractState<V, H>,
        _exit: &JvmAbstractState<V, H>,
        _call: &Call,
        _values: &InvocationValues<V>,
        result: Option<V>,
    ) -> Option<V> {
        result
    }

    fn on_field_read(&self, _object: &V, value: V) -> V {
        value
    }

    fn on_field_write<H: JvmHeap<V>>(
        &self,
        _state: &mut JvmAbstractState<V, H>,
        _object: &V,
        _value: &V,
    ) {
    }
}
