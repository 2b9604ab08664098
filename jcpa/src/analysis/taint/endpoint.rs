use crate::analysis::cfa::{Call, JvmCfa, ProgramLocation};
use crate::analysis::cpa::lattice::JoinSemiLattice;
use crate::analysis::cpa::lattice::set::SetAbstractState;
use crate::analysis::cpa::state::LocationState;
use crate::analysis::jvm::heap::JvmHeap;
use crate::analysis::jvm::state::JvmAbstractState;
use crate::analysis::taint::{TaintSink, TaintSource, TaintValue};
use crate::analysis::trace::{MemoryLocation, TraceStep};
use jcpa_bytecode::Instruction;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use tracing::debug;

/// A memory location read by a sink call, just before the call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaintEndpoint {
    pub location: ProgramLocation,
    pub memory_location: MemoryLocation,
}

impl TaintEndpoint {
    pub fn new(location: ProgramLocation, memory_location: MemoryLocation) -> Self {
        Self {
            location,
            memory_location,
        }
    }

    pub fn step(&self) -> TraceStep {
        TraceStep::new(self.memory_location.clone(), self.location)
    }
}

impl Display for TaintEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}", self.memory_location, self.location)
    }
}

/// The memory locations `sink` reads at `call`.
fn sink_inputs(sink: &TaintSink, call: &Call) -> Vec<MemoryLocation> {
    let mut inputs: Vec<MemoryLocation> = sink
        .takes_args
        .iter()
        .filter_map(|p| p.checked_sub(1).and_then(|i| call.argument_depth(i)))
        .map(MemoryLocation::Stack)
        .collect();
    if sink.takes_instance {
        inputs.extend(call.receiver_depth().map(MemoryLocation::Stack));
    }
    inputs.extend(sink.takes_globals.iter().cloned().map(MemoryLocation::Static));
    inputs
}

/// Tainted sink inputs found in `states`, with the sinks reading them and their joined
/// taints.
#[derive(Debug, Default)]
pub(crate) struct Endpoints {
    pub sinks: BTreeMap<TaintEndpoint, Vec<TaintSink>>,
    pub taints: BTreeMap<TaintEndpoint, SetAbstractState<TaintSource>>,
}

impl Endpoints {
    pub fn collect<'s, H, I>(cfa: &JvmCfa, sinks: &[TaintSink], states: I) -> Self
    where
        H: JvmHeap<TaintValue> + 's,
        I: IntoIterator<Item = &'s JvmAbstractState<TaintValue, H>>,
    {
        let mut endpoints = Self::default();
        for state in states {
            let location = *state.location();
            let Some(Instruction::Invoke { kind, method }) = cfa.instruction_at(&location) else {
                continue;
            };
            let call = Call::new(location, *kind, *method);
            for sink in sinks.iter().filter(|s| s.applies_to(&call)) {
                for input in sink_inputs(sink, &call) {
                    let Some(value) = input.read(state).filter(TaintValue::is_tainted) else {
                        continue;
                    };
                    let endpoint = TaintEndpoint::new(location, input);
                    debug!(%endpoint, sink = %sink.signature, "tainted sink input");
                    let triggered = endpoints.sinks.entry(endpoint.clone()).or_default();
                    if !triggered.contains(sink) {
                        triggered.push(sink.clone());
                    }
                    endpoints
                        .taints
                        .entry(endpoint)
                        .or_default()
                        .join(&value.taints);
                }
            }
        }
        endpoints
    }
}
