use crate::analysis::bam::BamCache;
use crate::analysis::cfa::{Call, CfaEdgeRef, JvmCfa, ProgramLocation};
use crate::analysis::jvm::frame::stack_shuffle;
use crate::analysis::jvm::heap::{FieldKey, JvmHeap};
use crate::analysis::jvm::reference::Reference;
use crate::analysis::jvm::state::JvmAbstractState;
use crate::analysis::jvm::JvmAbstractValue;
use crate::analysis::trace::{MemoryLocation, TraceStep};
use jcpa_bytecode::{Instruction, ValueKind};
use std::collections::BTreeSet;
use tracing::trace;

/// Decides where traces start: memory written by a call out of nothing the trace could
/// follow further back.
pub trait TraceOrigins {
    fn is_origin(&self, call: &Call, memory: &MemoryLocation) -> bool;

    /// Stack depths, at the call site, of the receiver and arguments whose objects `call`
    /// writes an origin into. Every location aliasing one of them after the call is an
    /// origin too.
    fn written_operands(&self, _call: &Call) -> Vec<u16> {
        Vec::new()
    }
}

/// The result of one backward step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackwardSteps {
    /// Some incoming edge produced the value out of an origin.
    pub origin: bool,
    pub predecessors: Vec<TraceStep>,
}

enum Flow {
    Origin,
    From(Vec<TraceStep>),
}

/// Computes, for a memory location before an instruction, the memory locations before
/// each predecessor instruction its value may have come from.
///
/// Only predecessors holding a relevant value in some state of the cached forward
/// analysis are returned, so states discarded by the forward run never extend a trace.
pub struct JvmMemoryLocationTransferRelation<'a, V, H> {
    cfa: &'a JvmCfa,
    cache: &'a BamCache<JvmAbstractState<V, H>>,
    origins: &'a dyn TraceOrigins,
    relevant: &'a dyn Fn(&V) -> bool,
}

impl<'a, V: JvmAbstractValue, H: JvmHeap<V>> JvmMemoryLocationTransferRelation<'a, V, H> {
    pub fn new(
        cfa: &'a JvmCfa,
        cache: &'a BamCache<JvmAbstractState<V, H>>,
        origins: &'a dyn TraceOrigins,
        relevant: &'a dyn Fn(&V) -> bool,
    ) -> Self {
        Self {
            cfa,
            cache,
            origins,
            relevant,
        }
    }

    /// Whether some cached state holds a relevant value at `step`.
    pub fn is_relevant(&self, step: &TraceStep) -> bool {
        self.cache
            .states_at(&step.location)
            .any(|s| step.memory.read(s).is_some_and(|v| (self.relevant)(&v)))
    }

    pub fn predecessors(&self, step: &TraceStep) -> BackwardSteps {
        let mut origin = false;
        let mut candidates = BTreeSet::new();
        for edge in self.cfa.incoming(&step.location) {
            let flow = match edge.edge.call() {
                Some(call) => Flow::From(Self::into_callee(call, &step.memory, edge.source)),
                None => self.through_instruction(&edge, &step.memory),
            };
            match flow {
                Flow::Origin => origin = true,
                Flow::From(steps) => candidates.extend(steps),
            }
        }
        let predecessors: Vec<TraceStep> = candidates
            .into_iter()
            .filter(|s| self.is_relevant(s))
            .collect();
        trace!(%step, origin, predecessors = predecessors.len(), "backward step");
        BackwardSteps {
            origin,
            predecessors,
        }
    }

    /// From the entry of a callee back to its call site.
    fn into_callee(call: &Call, memory: &MemoryLocation, site: ProgramLocation) -> Vec<TraceStep> {
        let before = match memory {
            MemoryLocation::Local(index) => match call.popped_slots().checked_sub(index + 1) {
                Some(depth) => MemoryLocation::Stack(depth),
                None => return Vec::new(),
            },
            MemoryLocation::Stack(_) => return Vec::new(),
            other => other.clone(),
        };
        vec![TraceStep::new(before, site)]
    }

    fn through_instruction(&self, edge: &CfaEdgeRef<'_>, memory: &MemoryLocation) -> Flow {
        let site = edge.source;
        let instruction = &edge.edge.instruction;
        let at_site = |memory: MemoryLocation| TraceStep::new(memory, site);
        if let Instruction::Invoke { kind, method } = instruction {
            return self.through_call(&Call::new(site, *kind, *method), memory, edge.target);
        }
        let (popped, pushed) = instruction.stack_effect();
        let sources = match memory {
            MemoryLocation::Stack(depth) => match instruction {
                Instruction::Return(_) if *depth < popped => vec![MemoryLocation::Stack(*depth)],
                Instruction::Return(_) | Instruction::Throw => Vec::new(),
                _ if *depth >= pushed => vec![MemoryLocation::Stack(depth - pushed + popped)],
                _ => self.operands(instruction, *depth, site),
            },
            MemoryLocation::Local(index) => match instruction {
                Instruction::Store { kind, index: stored }
                    if (*stored..*stored + kind.slots()).contains(index) =>
                {
                    vec![MemoryLocation::Stack(kind.slots() - 1 - (index - stored))]
                }
                _ => vec![memory.clone()],
            },
            MemoryLocation::Static(name) => match instruction {
                Instruction::PutStatic(field) if field.global_name() == *name => {
                    vec![MemoryLocation::Stack(field.kind().slots() - 1)]
                }
                _ => vec![memory.clone()],
            },
            MemoryLocation::Heap(_, key) => match instruction {
                Instruction::PutField(field) if *key == FieldKey::field(&field.name) => {
                    vec![MemoryLocation::Stack(field.kind().slots() - 1), memory.clone()]
                }
                Instruction::ArrayStore(kind) if *key == FieldKey::AnyIndex => {
                    vec![MemoryLocation::Stack(kind.slots() - 1), memory.clone()]
                }
                _ => vec![memory.clone()],
            },
        };
        Flow::From(sources.into_iter().map(at_site).collect())
    }

    /// Where the slot `depth` pushed by `instruction` was computed from.
    fn operands(&self, instruction: &Instruction, depth: u16, site: ProgramLocation) -> Vec<MemoryLocation> {
        let value_slot = |kind: ValueKind| depth == kind.slots() - 1;
        match instruction {
            Instruction::Load { kind, index } => {
                vec![MemoryLocation::Local(index + (kind.slots() - 1 - depth))]
            }
            Instruction::Dup
            | Instruction::DupX1
            | Instruction::DupX2
            | Instruction::Dup2
            | Instruction::Dup2X1
            | Instruction::Dup2X2
            | Instruction::Swap => stack_shuffle(instruction)
                .and_then(|s| s.origin(depth))
                .map(MemoryLocation::Stack)
                .into_iter()
                .collect(),
            Instruction::Arithmetic { op, kind } if value_slot(*kind) => {
                let right = if op.is_shift() { 1 } else { kind.slots() };
                vec![
                    MemoryLocation::Stack(right - 1),
                    MemoryLocation::Stack(right + kind.slots() - 1),
                ]
            }
            Instruction::Negate(kind) if value_slot(*kind) => {
                vec![MemoryLocation::Stack(kind.slots() - 1)]
            }
            Instruction::Convert { from, to } if value_slot(*to) => {
                vec![MemoryLocation::Stack(from.slots() - 1)]
            }
            Instruction::Compare(kind) => vec![
                MemoryLocation::Stack(kind.slots() - 1),
                MemoryLocation::Stack(2 * kind.slots() - 1),
            ],
            Instruction::ArrayLength | Instruction::InstanceOf(_) | Instruction::CheckCast(_) => {
                vec![MemoryLocation::Stack(0)]
            }
            Instruction::GetStatic(field) if value_slot(field.kind()) => {
                vec![MemoryLocation::Static(field.global_name())]
            }
            Instruction::GetField(field) if value_slot(field.kind()) => {
                self.heap_sources(site, 0, FieldKey::field(&field.name))
            }
            Instruction::ArrayLoad(kind) if value_slot(*kind) => {
                self.heap_sources(site, 1, FieldKey::AnyIndex)
            }
            _ => Vec::new(),
        }
    }

    /// The fields read through the object at stack `depth` before `site`, or the object
    /// itself when nothing is known about what it points to.
    fn heap_sources(&self, site: ProgramLocation, depth: u16, key: FieldKey) -> Vec<MemoryLocation> {
        let references: BTreeSet<Reference> = self
            .cache
            .states_at(&site)
            .flat_map(|s| s.frame.peek(depth).references().iter().cloned().collect::<Vec<_>>())
            .collect();
        if references.is_empty() {
            return vec![MemoryLocation::Stack(depth)];
        }
        references
            .into_iter()
            .map(|r| MemoryLocation::Heap(r, key.clone()))
            .collect()
    }

    /// Back over an invocation, from its return point to its call site or into the exits
    /// of the analyzed callees.
    fn through_call(&self, call: &Call, memory: &MemoryLocation, after: ProgramLocation) -> Flow {
        if self.origins.is_origin(call, memory) || self.aliases_written_operand(call, memory, after) {
            return Flow::Origin;
        }
        let site = call.caller;
        let analyzed: Vec<ProgramLocation> = self
            .cfa
            .call_edges_from(&site)
            .filter(|c| !self.cache.entries_for(&c.target).is_empty())
            .map(|c| ProgramLocation::Exit(c.target))
            .collect();
        let returned = call.return_slots();
        let mut steps = Vec::new();
        match memory {
            MemoryLocation::Stack(depth) if *depth < returned => {
                if analyzed.is_empty() {
                    let arguments = (0..call.argument_count()).filter_map(|i| call.argument_depth(i));
                    for depth in arguments.chain(call.receiver_depth()) {
                        steps.push(TraceStep::new(MemoryLocation::Stack(depth), site));
                    }
                } else {
                    for exit in &analyzed {
                        steps.push(TraceStep::new(memory.clone(), *exit));
                    }
                }
            }
            MemoryLocation::Stack(depth) => {
                let below = depth - returned + call.popped_slots();
                steps.push(TraceStep::new(MemoryLocation::Stack(below), site));
            }
            MemoryLocation::Local(_) => steps.push(TraceStep::new(memory.clone(), site)),
            MemoryLocation::Static(_) | MemoryLocation::Heap(..) => {
                for exit in &analyzed {
                    steps.push(TraceStep::new(memory.clone(), *exit));
                }
                if analyzed.is_empty() || matches!(memory, MemoryLocation::Heap(..)) {
                    steps.push(TraceStep::new(memory.clone(), site));
                }
            }
        }
        if !matches!(memory, MemoryLocation::Stack(depth) if *depth < returned) {
            steps.extend(self.callee_aliases(memory, after, &analyzed));
        }
        Flow::From(steps)
    }

    /// The objects `memory` may point to in the states at `location`.
    fn references_at(&self, memory: &MemoryLocation, location: &ProgramLocation) -> BTreeSet<Reference> {
        self.cache
            .states_at(location)
            .filter_map(|s| memory.read(s))
            .flat_map(|v| v.references().iter().cloned().collect::<Vec<_>>())
            .collect()
    }

    fn aliases_written_operand(&self, call: &Call, memory: &MemoryLocation, after: ProgramLocation) -> bool {
        let written: BTreeSet<Reference> = self
            .origins
            .written_operands(call)
            .into_iter()
            .flat_map(|depth| self.references_at(&MemoryLocation::Stack(depth), &call.caller))
            .collect();
        !written.is_empty()
            && self
                .references_at(memory, &after)
                .iter()
                .any(|r| written.contains(r))
    }

    /// The callee locals that, at the callee's exit, alias the object `memory` points to
    /// after the call. The callee may have written into that object.
    fn callee_aliases(
        &self,
        memory: &MemoryLocation,
        after: ProgramLocation,
        analyzed: &[ProgramLocation],
    ) -> Vec<TraceStep> {
        let references = self.references_at(memory, &after);
        if references.is_empty() {
            return Vec::new();
        }
        let mut steps = BTreeSet::new();
        for exit in analyzed {
            for state in self.cache.states_at(exit) {
                for (index, value) in state.frame.locals.iter().enumerate() {
                    if value.references().iter().any(|r| references.contains(r)) {
                        steps.insert(TraceStep::new(MemoryLocation::Local(index as u16), *exit));
                    }
                }
            }
        }
        steps.into_iter().collect()
    }
}
