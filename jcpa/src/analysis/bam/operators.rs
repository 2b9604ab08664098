use crate::analysis::cfa::{Call, ProgramLocation};
use crate::analysis::cpa::lattice::set::SetAbstractState;
use crate::analysis::jvm::frame::JvmFrameAbstractState;
use crate::analysis::jvm::heap::JvmHeap;
use crate::analysis::jvm::reference::Reference;
use crate::analysis::jvm::state::JvmAbstractState;
use crate::analysis::jvm::transfer::pop_invocation_values;
use crate::analysis::jvm::{JvmAbstractValue, ValueSemantics};
use jcpa_bytecode::ValueKind;
use tracing::trace;

/// Builds the entry state of a callee from the state at the call site.
pub trait ReduceOperator<S> {
    fn reduce(&self, state: &S, call: &Call) -> S;
}

/// Builds the state at the return point from the state at the call site and an exit
/// state of the callee.
pub trait ExpandOperator<S> {
    fn expand(&self, caller: &S, exit: &S, call: &Call) -> S;
}

/// Moves the receiver and arguments into the callee's locals and drops the caller's
/// operand stack. Static fields are kept; the heap is optionally restricted to what the
/// callee can reach.
#[derive(Debug, Default, Copy, Clone)]
pub struct JvmDefaultReduceOperator {
    reduce_heap: bool,
}

impl JvmDefaultReduceOperator {
    pub fn new(reduce_heap: bool) -> Self {
        Self { reduce_heap }
    }
}

impl<V: JvmAbstractValue, H: JvmHeap<V>> ReduceOperator<JvmAbstractState<V, H>>
    for JvmDefaultReduceOperator
{
    fn reduce(&self, state: &JvmAbstractState<V, H>, call: &Call) -> JvmAbstractState<V, H> {
        let mut caller_frame = state.frame.clone();
        let values = pop_invocation_values(&mut caller_frame, call);
        let mut frame = JvmFrameAbstractState::new();
        let mut index = 0;
        if let Some(receiver) = values.receiver {
            frame.store(0, ValueKind::Reference, receiver);
            index = 1;
        }
        for (kind, value) in call.parameters.iter().zip(values.arguments) {
            frame.store(index, *kind, value);
            index += kind.slots();
        }
        let mut heap = state.heap.clone();
        if self.reduce_heap {
            let roots: SetAbstractState<Reference> = frame
                .values()
                .chain(state.static_fields.values())
                .flat_map(|v| v.references().iter().cloned())
                .collect();
            heap.reduce(&roots);
        }
        trace!(target = %call.target, locals = index, "reduced call");
        JvmAbstractState::new(
            ProgramLocation::entry(call.target),
            frame,
            heap,
            state.static_fields.clone(),
        )
    }
}

/// Pops the invocation values off the caller's stack, pushes the callee's return value
/// and takes over the callee's heap and static fields.
#[derive(Debug, Copy, Clone)]
pub struct JvmDefaultExpandOperator<'a, M> {
    semantics: &'a M,
}

impl<'a, M> JvmDefaultExpandOperator<'a, M> {
    pub fn new(semantics: &'a M) -> Self {
        Self { semantics }
    }
}

impl<V, H, M> ExpandOperator<JvmAbstractState<V, H>> for JvmDefaultExpandOperator<'_, M>
where
    V: JvmAbstractValue,
    H: JvmHeap<V>,
    M: ValueSemantics<V>,
{
    fn expand(
        &self,
        caller: &JvmAbstractState<V, H>,
        exit: &JvmAbstractState<V, H>,
        call: &Call,
    ) -> JvmAbstractState<V, H> {
        let mut result = caller.clone();
        let values = pop_invocation_values(&mut result.frame, call);
        result.heap.expand(&exit.heap);
        result.static_fields = exit.static_fields.clone();
        let returned = call.return_kind.map(|kind| {
            let depth = if kind.is_category2() { 1 } else { 0 };
            exit.frame.peek(depth)
        });
        let returned = self
            .semantics
            .after_call(&mut result, exit, call, &values, returned);
        if let Some(kind) = call.return_kind {
            let value = returned.unwrap_or_else(|| self.semantics.unknown(kind));
            result.frame.push_value(kind, value);
        }
        result.with_location(call.return_point().unwrap_or(ProgramLocation::Unknown))
    }
}
