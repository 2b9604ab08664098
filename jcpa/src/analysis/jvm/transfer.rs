use crate::analysis::cfa::{Call, CfaEdgeRef, JvmCfa, ProgramLocation};
use crate::analysis::cpa::operators::TransferRelation;
use crate::analysis::cpa::state::{LocationState, Successor};
use crate::analysis::jvm::frame::JvmFrameAbstractState;
use crate::analysis::jvm::heap::JvmHeap;
use crate::analysis::jvm::reference::{Reference, ReferenceSlot};
use crate::analysis::jvm::state::JvmAbstractState;
use crate::analysis::jvm::{InvocationValues, JvmAbstractValue, ValueSemantics};
use jcpa_bytecode::{Instruction, ValueKind};
use std::marker::PhantomData;

/// Pops the arguments and the receiver of `call` off `frame`.
pub fn pop_invocation_values<V: JvmAbstractValue>(
    frame: &mut JvmFrameAbstractState<V>,
    call: &Call,
) -> InvocationValues<V> {
    let mut arguments: Vec<V> = call
        .parameters
        .iter()
        .rev()
        .map(|kind| frame.pop_value(*kind))
        .collect();
    arguments.reverse();
    let receiver = (!call.is_static()).then(|| frame.pop());
    InvocationValues {
        receiver,
        arguments,
    }
}

/// Interprets the instructions along the intraprocedural edges of the automaton.
///
/// Call edges produce no successor here; the fallthrough edge of an invocation models the
/// call as opaque through [`ValueSemantics::invoke_unknown`].
pub struct JvmTransferRelation<'a, V, H, M> {
    cfa: &'a JvmCfa,
    semantics: &'a M,
    _domain: PhantomData<fn() -> (V, H)>,
}

impl<'a, V, H, M> JvmTransferRelation<'a, V, H, M>
where
    V: JvmAbstractValue,
    H: JvmHeap<V>,
    M: ValueSemantics<V>,
{
    pub fn new(cfa: &'a JvmCfa, semantics: &'a M) -> Self {
        Self {
            cfa,
            semantics,
            _domain: PhantomData,
        }
    }

    /// The state after following `edge`, or `None` for call edges.
    pub fn successor(
        &self,
        state: &JvmAbstractState<V, H>,
        edge: &CfaEdgeRef<'_>,
    ) -> Option<JvmAbstractState<V, H>> {
        if edge.edge.is_call() {
            return None;
        }
        let mut next = state.clone();
        self.execute(&mut next, &edge.edge.instruction, edge.source);
        next.set_location(edge.target);
        Some(next)
    }

    /// A value nothing is known about, with a fresh reference for reference kinds.
    fn fresh(&self, kind: ValueKind, location: ProgramLocation, slot: ReferenceSlot) -> V {
        match kind {
            ValueKind::Reference => self
                .semantics
                .new_reference(Reference::new(location, slot)),
            k => self.semantics.unknown(k),
        }
    }

    fn stack_slot(state: &JvmAbstractState<V, H>) -> ReferenceSlot {
        ReferenceSlot::Stack(state.frame.operand_stack.len() as u16)
    }

    /// Applies `instruction`, located at `location`, to `state` in place.
    pub fn execute(
        &self,
        state: &mut JvmAbstractState<V, H>,
        instruction: &Instruction,
        location: ProgramLocation,
    ) {
        let m = self.semantics;
        let frame = &mut state.frame;
        match instruction {
            Instruction::Nop | Instruction::Goto(_) | Instruction::Ret(_) | Instruction::CheckCast(_) => {}
            Instruction::Jsr(_) => frame.push(m.unknown(ValueKind::Reference)),
            Instruction::Constant(c) => frame.push_value(c.kind(), m.constant(c)),
            Instruction::Load { kind, index } => {
                let value = frame.load(*index);
                frame.push_value(*kind, value);
            }
            Instruction::Store { kind, index } => {
                let value = frame.pop_value(*kind);
                frame.store(*index, *kind, value);
            }
            Instruction::Increment { index, delta } => {
                let value = m.increment(&frame.load(*index), *delta);
                frame.store(*index, ValueKind::Int, value);
            }
            Instruction::ArrayLoad(kind) => {
                frame.pop();
                let array = frame.pop();
                let slot = Self::stack_slot(state);
                let value = state
                    .heap
                    .get_array(&array, *kind)
                    .unwrap_or_else(|| self.fresh(*kind, location, slot));
                state.frame.push_value(*kind, value);
            }
            Instruction::ArrayStore(kind) => {
                let value = frame.pop_value(*kind);
                frame.pop();
                let array = frame.pop();
                state.heap.set_array(&array, *kind, value);
            }
            Instruction::Pop
            | Instruction::IfZero { .. }
            | Instruction::TableSwitch { .. }
            | Instruction::LookupSwitch { .. }
            | Instruction::MonitorEnter
            | Instruction::MonitorExit => {
                frame.pop();
            }
            Instruction::Pop2 | Instruction::IfCompare { .. } => {
                frame.pop_slots(2);
            }
            Instruction::Dup
            | Instruction::DupX1
            | Instruction::DupX2
            | Instruction::Dup2
            | Instruction::Dup2X1
            | Instruction::Dup2X2
            | Instruction::Swap => {
                frame.shuffle(instruction);
            }
            Instruction::Arithmetic { op, kind } => {
                let right_kind = if op.is_shift() { ValueKind::Int } else { *kind };
                let right = frame.pop_value(right_kind);
                let left = frame.pop_value(*kind);
                frame.push_value(*kind, m.arithmetic(*op, *kind, &left, &right));
            }
            Instruction::Negate(kind) => {
                let value = frame.pop_value(*kind);
                frame.push_value(*kind, m.unary(instruction, &value));
            }
            Instruction::Convert { from, to } => {
                let value = frame.pop_value(*from);
                frame.push_value(*to, m.unary(instruction, &value));
            }
            Instruction::ArrayLength | Instruction::InstanceOf(_) => {
                let value = frame.pop();
                frame.push(m.unary(instruction, &value));
            }
            Instruction::Compare(kind) => {
                let right = frame.pop_value(*kind);
                let left = frame.pop_value(*kind);
                frame.push(m.compare(*kind, &left, &right));
            }
            Instruction::Return(kind) => {
                let value = kind.map(|k| frame.pop_value(k));
                frame.operand_stack.clear();
                if let (Some(kind), Some(value)) = (kind, value) {
                    frame.push_value(*kind, value);
                }
            }
            Instruction::Throw => {
                frame.operand_stack.clear();
            }
            Instruction::GetStatic(field) => {
                let name = field.global_name();
                let kind = field.kind();
                let value = match state.static_field(&name) {
                    Some(v) => v.clone(),
                    None if kind == ValueKind::Reference => {
                        m.new_reference(Reference::static_field(location, &name))
                    }
                    None => m.unknown(kind),
                };
                state.frame.push_value(kind, value);
            }
            Instruction::PutStatic(field) => {
                let value = frame.pop_value(field.kind());
                state.static_fields.insert(field.global_name(), value);
            }
            Instruction::GetField(field) => {
                let object = frame.pop();
                let slot = Self::stack_slot(state);
                let value = state
                    .heap
                    .get_field(&object, &field.name)
                    .unwrap_or_else(|| self.fresh(field.kind(), location, slot));
                let value = m.on_field_read(&object, value);
                state.frame.push_value(field.kind(), value);
            }
            Instruction::PutField(field) => {
                let value = frame.pop_value(field.kind());
                let object = frame.pop();
                state.heap.set_field(&object, &field.name, value.clone());
                m.on_field_write(state, &object, &value);
            }
            Instruction::Invoke { kind, method } => {
                self.invoke_unknown(state, &Call::new(location, *kind, *method));
            }
            Instruction::New(_) => {
                let reference = Reference::new(location, Self::stack_slot(state));
                state.heap.new_object(reference.clone());
                state.frame.push(m.new_reference(reference));
            }
            Instruction::NewArray(kind) => {
                frame.pop();
                let reference = Reference::new(location, Self::stack_slot(state));
                state.heap.new_array(reference.clone(), *kind);
                state.frame.push(m.new_reference(reference));
            }
            Instruction::MultiNewArray { dimensions, .. } => {
                frame.pop_slots(u16::from(*dimensions));
                let reference = Reference::new(location, Self::stack_slot(state));
                state.heap.new_array(reference.clone(), ValueKind::Reference);
                state.frame.push(m.new_reference(reference));
            }
        }
    }

    fn invoke_unknown(&self, state: &mut JvmAbstractState<V, H>, call: &Call) {
        let values = pop_invocation_values(&mut state.frame, call);
        let slot = Self::stack_slot(state);
        let result = call
            .return_kind
            .map(|kind| self.fresh(kind, call.caller, slot));
        let returned = self
            .semantics
            .invoke_unknown(state, call, &values, result);
        if let Some(kind) = call.return_kind {
            let value = returned.unwrap_or_else(|| self.semantics.unknown(kind));
            state.frame.push_value(kind, value);
        }
    }
}

impl<V, H, M> TransferRelation<JvmAbstractState<V, H>> for JvmTransferRelation<'_, V, H, M>
where
    V: JvmAbstractValue,
    H: JvmHeap<V>,
    M: ValueSemantics<V>,
{
    fn successors<'b>(&'b self, state: &'b JvmAbstractState<V, H>) -> Successor<'b, JvmAbstractState<V, H>> {
        let successors: Vec<_> = self
            .cfa
            .outgoing(state.location())
            .filter_map(|edge| self.successor(state, &edge))
            .collect();
        successors.into_iter().into()
    }
}
