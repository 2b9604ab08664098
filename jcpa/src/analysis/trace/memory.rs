use crate::analysis::cfa::ProgramLocation;
use crate::analysis::jvm::heap::{FieldKey, JvmHeap};
use crate::analysis::jvm::reference::Reference;
use crate::analysis::jvm::state::JvmAbstractState;
use crate::analysis::jvm::JvmAbstractValue;
use std::fmt::{Display, Formatter};

/// A place a value can be stored in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemoryLocation {
    /// Operand stack slot, counted from the top.
    Stack(u16),
    Local(u16),
    /// Static field, as `Class.field`.
    Static(String),
    Heap(Reference, FieldKey),
}

impl MemoryLocation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stack(_) => "stack",
            Self::Local(_) => "local",
            Self::Static(_) => "static",
            Self::Heap(..) => "heap",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            Self::Stack(i) | Self::Local(i) => i.to_string(),
            Self::Static(name) => name.clone(),
            Self::Heap(reference, key) => format!("{reference}.{key}"),
        }
    }

    /// The value held here in `state`, if the location exists in it.
    pub fn read<V: JvmAbstractValue, H: JvmHeap<V>>(&self, state: &JvmAbstractState<V, H>) -> Option<V> {
        match self {
            Self::Stack(depth) => (usize::from(*depth) < state.frame.operand_stack.len())
                .then(|| state.frame.peek(*depth)),
            Self::Local(index) => {
                (usize::from(*index) < state.frame.locals.len()).then(|| state.frame.load(*index))
            }
            Self::Static(name) => state.static_field(name).cloned(),
            Self::Heap(reference, key) => state.heap.value_at(reference, key),
        }
    }
}

impl Display for MemoryLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.kind(), self.detail())
    }
}

/// A memory location just before the instruction at a program location executes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceStep {
    pub memory: MemoryLocation,
    pub location: ProgramLocation,
}

impl TraceStep {
    pub fn new(memory: MemoryLocation, location: ProgramLocation) -> Self {
        Self { memory, location }
    }
}

impl Display for TraceStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}", self.memory, self.location)
    }
}
