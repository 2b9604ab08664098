use crate::analysis::cfa::Call;
use crate::analysis::cpa::lattice::JoinSemiLattice;
use crate::analysis::cpa::lattice::set::SetAbstractState;
use crate::analysis::jvm::heap::JvmHeap;
use crate::analysis::jvm::state::JvmAbstractState;
use crate::analysis::jvm::{InvocationValues, JvmAbstractValue, ValueSemantics};
use crate::analysis::taint::{TaintSource, TaintValue};
use crate::analysis::trace::{MemoryLocation, TraceOrigins};
use jcpa_bytecode::{ArithmeticOp, Constant, Instruction, MethodSignature, ValueKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::trace;

/// Rewrites the taints returned by a call, typically to model a sanitizer.
pub type TaintTransformer =
    Arc<dyn Fn(&Call, SetAbstractState<TaintSource>) -> SetAbstractState<TaintSource> + Send + Sync>;

/// Where the taint of the receiver and arguments of an unanalyzed call flows to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropagationTarget {
    Return,
    Instance,
    /// 1-based argument position.
    Argument(usize),
    Static(String),
}

/// Taint tracking as a [`ValueSemantics`].
///
/// Computations carry the union of their operands' taints. A call without an analyzed body
/// passes the union of its receiver and argument taints to its return value, unless extra
/// propagation targets are registered for the method. Sources add their taint after the
/// call, whether or not its body was analyzed.
#[derive(Clone, Default)]
pub struct TaintSemantics {
    sources: HashMap<MethodSignature, Vec<TaintSource>>,
    propagation: HashMap<MethodSignature, BTreeSet<PropagationTarget>>,
    transformers: HashMap<MethodSignature, TaintTransformer>,
    object_taint: bool,
}

impl TaintSemantics {
    pub fn new<I: IntoIterator<Item = TaintSource>>(sources: I) -> Self {
        let mut semantics = Self::default();
        for source in sources {
            semantics
                .sources
                .entry(source.signature)
                .or_default()
                .push(source);
        }
        semantics
    }

    pub fn with_propagation(
        mut self,
        propagation: HashMap<MethodSignature, BTreeSet<PropagationTarget>>,
    ) -> Self {
        self.propagation = propagation;
        self
    }

    pub fn with_transformers(mut self, transformers: HashMap<MethodSignature, TaintTransformer>) -> Self {
        self.transformers = transformers;
        self
    }

    /// Objects carry the taint of everything stored in them, and reading a field of a
    /// tainted object yields a tainted value.
    pub fn with_object_taint(mut self, enabled: bool) -> Self {
        self.object_taint = enabled;
        self
    }

    fn sources_for<'a>(&'a self, call: &'a Call) -> impl Iterator<Item = &'a TaintSource> {
        self.sources
            .get(&call.target)
            .into_iter()
            .flatten()
            .filter(move |s| s.applies_to(call))
    }

    fn union<'a, I: IntoIterator<Item = &'a TaintValue>>(values: I) -> SetAbstractState<TaintSource> {
        let mut taints = SetAbstractState::new();
        for value in values {
            taints.join(&value.taints);
        }
        taints
    }

    fn taint_aliases<H: JvmHeap<TaintValue>>(
        state: &mut JvmAbstractState<TaintValue, H>,
        value: Option<&TaintValue>,
        taints: &SetAbstractState<TaintSource>,
    ) {
        if let Some(value) = value {
            state.update_aliases(value.references(), |v| v.tainted(taints));
        }
    }

    fn taint_static<H: JvmHeap<TaintValue>>(
        state: &mut JvmAbstractState<TaintValue, H>,
        name: &str,
        taints: &SetAbstractState<TaintSource>,
    ) {
        let value = state
            .static_field(name)
            .cloned()
            .unwrap_or_else(TaintValue::clean)
            .tainted(taints);
        state.static_fields.insert(name.to_string(), value);
    }

    /// Adds the taint of every source matching `call`; returns the new return value.
    fn apply_sources<H: JvmHeap<TaintValue>>(
        &self,
        state: &mut JvmAbstractState<TaintValue, H>,
        call: &Call,
        values: &InvocationValues<TaintValue>,
        mut result: Option<TaintValue>,
    ) -> Option<TaintValue> {
        for source in self.sources_for(call) {
            trace!(source = %source.signature, at = %call.caller, "taint source");
            let taints = SetAbstractState::singleton(source.clone());
            if source.taints_return {
                result = result.map(|r| r.tainted(&taints));
            }
            if source.taints_instance {
                Self::taint_aliases(state, values.receiver.as_ref(), &taints);
            }
            for position in &source.taints_args {
                Self::taint_aliases(state, values.argument(*position), &taints);
            }
            for name in &source.taints_globals {
                Self::taint_static(state, name, &taints);
            }
        }
        result
    }

    fn transform(&self, call: &Call, result: Option<TaintValue>) -> Option<TaintValue> {
        let Some(transformer) = self.transformers.get(&call.target) else {
            return result;
        };
        result.map(|r| {
            let taints = transformer(call, r.taints.clone());
            r.with_taints(taints)
        })
    }
}

impl ValueSemantics<TaintValue> for TaintSemantics {
    fn constant(&self, _constant: &Constant) -> TaintValue {
        TaintValue::clean()
    }

    fn arithmetic(
        &self,
        _op: ArithmeticOp,
        _kind: ValueKind,
        left: &TaintValue,
        right: &TaintValue,
    ) -> TaintValue {
        TaintValue::clean().with_taints(Self::union([left, right]))
    }

    fn unary(&self, _instruction: &Instruction, operand: &TaintValue) -> TaintValue {
        TaintValue::clean().with_taints(operand.taints.clone())
    }

    fn compare(&self, _kind: ValueKind, left: &TaintValue, right: &TaintValue) -> TaintValue {
        TaintValue::clean().with_taints(Self::union([left, right]))
    }

    fn increment(&self, value: &TaintValue, _delta: i32) -> TaintValue {
        value.clone()
    }

    fn invoke_unknown<H: JvmHeap<TaintValue>>(
        &self,
        state: &mut JvmAbstractState<TaintValue, H>,
        call: &Call,
        values: &InvocationValues<TaintValue>,
        result: Option<TaintValue>,
    ) -> Option<TaintValue> {
        let flowing = Self::union(values.all());
        let mut result = result;
        match self.propagation.get(&call.target) {
            None => result = result.map(|r| r.tainted(&flowing)),
            Some(targets) if !flowing.is_empty() => {
                for target in targets {
                    match target {
                        PropagationTarget::Return => {
                            result = result.map(|r| r.tainted(&flowing));
                        }
                        PropagationTarget::Instance => {
                            Self::taint_aliases(state, values.receiver.as_ref(), &flowing);
                        }
                        PropagationTarget::Argument(position) => {
                            Self::taint_aliases(state, values.argument(*position), &flowing);
                        }
                        PropagationTarget::Static(name) => {
                            Self::taint_static(state, name, &flowing);
                        }
                    }
                }
            }
            Some(_) => {}
        }
        let result = self.apply_sources(state, call, values, result);
        self.transform(call, result)
    }

    /// Objects the caller passed in carry whatever taint the callee left on their aliases.
    fn after_call<H: JvmHeap<TaintValue>>(
        &self,
        state: &mut JvmAbstractState<TaintValue, H>,
        exit: &JvmAbstractState<TaintValue, H>,
        call: &Call,
        values: &InvocationValues<TaintValue>,
        result: Option<TaintValue>,
    ) -> Option<TaintValue> {
        for passed in values.all() {
            let references = passed.references();
            let taints = Self::union(
                exit.frame
                    .values()
                    .chain(exit.static_fields.values())
                    .filter(|v| v.references().intersects(references)),
            );
            if !taints.is_empty() {
                state.update_aliases(references, |v| v.tainted(&taints));
            }
        }
        let result = self.apply_sources(state, call, values, result);
        self.transform(call, result)
    }

    fn on_field_read(&self, object: &TaintValue, value: TaintValue) -> TaintValue {
        if self.object_taint {
            value.tainted(&object.taints)
        } else {
            value
        }
    }

    fn on_field_write<H: JvmHeap<TaintValue>>(
        &self,
        state: &mut JvmAbstractState<TaintValue, H>,
        object: &TaintValue,
        value: &TaintValue,
    ) {
        if self.object_taint && value.is_tainted() {
            state.update_aliases(object.references(), |v| v.tainted(&value.taints));
        }
    }
}

impl TraceOrigins for TaintSemantics {
    fn is_origin(&self, call: &Call, memory: &MemoryLocation) -> bool {
        self.sources_for(call).any(|source| match memory {
            MemoryLocation::Stack(depth) => source.taints_return && *depth < call.return_slots(),
            MemoryLocation::Static(name) => source.taints_globals.contains(name),
            _ => false,
        })
    }

    fn written_operands(&self, call: &Call) -> Vec<u16> {
        let mut depths = Vec::new();
        for source in self.sources_for(call) {
            if source.taints_instance {
                depths.extend(call.receiver_depth());
            }
            depths.extend(
                source
                    .taints_args
                    .iter()
                    .filter_map(|p| p.checked_sub(1).and_then(|i| call.argument_depth(i))),
            );
        }
        depths
    }
}
