//! The control flow automaton: one node per reachable instruction of every method with code,
//! an exit node per method and a shared node for control flow that cannot be resolved.

mod builder;
mod call_graph;
mod edge;
mod location;
#[cfg(test)]
mod tests;

pub use builder::CfaBuilder;
pub use call_graph::{CallGraph, CallResolver, ClassHierarchyCallResolver, StaticCallResolver};
pub use edge::{Call, CfaEdge, CfaEdgeKind, CfaEdgeRef};
pub use location::ProgramLocation;

use jcpa_bytecode::{Instruction, MethodDescriptor, MethodSignature};
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashMap};

/// What the automaton knows about a method it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfaMethod {
    pub signature: MethodSignature,
    pub descriptor: MethodDescriptor,
    pub is_static: bool,
    pub max_locals: u16,
}

impl CfaMethod {
    /// Local variable slots occupied by the receiver and the parameters on entry.
    pub fn parameter_slots(&self) -> u16 {
        self.descriptor.argument_slots() + u16::from(!self.is_static)
    }
}

/// Built once and then only read while analyses run. [`clear`](Self::clear) releases the
/// graph once no analysis needs it anymore.
#[derive(Debug)]
pub struct JvmCfa {
    graph: StableDiGraph<ProgramLocation, CfaEdge>,
    indices: HashMap<ProgramLocation, NodeIndex>,
    methods: BTreeMap<MethodSignature, CfaMethod>,
    function_nodes: BTreeMap<MethodSignature, Vec<ProgramLocation>>,
}

impl Default for JvmCfa {
    fn default() -> Self {
        Self::new()
    }
}

impl JvmCfa {
    pub fn new() -> Self {
        let mut cfa = Self {
            graph: StableDiGraph::new(),
            indices: HashMap::new(),
            methods: BTreeMap::new(),
            function_nodes: BTreeMap::new(),
        };
        cfa.add_node(ProgramLocation::Unknown);
        cfa
    }

    pub fn add_method(&mut self, method: CfaMethod) {
        self.methods.insert(method.signature, method);
    }

    pub fn add_node(&mut self, location: ProgramLocation) -> NodeIndex {
        if let Some(idx) = self.indices.get(&location) {
            return *idx;
        }
        let idx = self.graph.add_node(location);
        self.indices.insert(location, idx);
        if let Some(signature) = location.signature() {
            self.function_nodes
                .entry(signature)
                .or_default()
                .push(location);
        }
        idx
    }

    pub fn add_edge(&mut self, from: ProgramLocation, to: ProgramLocation, edge: CfaEdge) {
        let from = self.add_node(from);
        let to = self.add_node(to);
        self.graph.add_edge(from, to, edge);
    }

    pub fn contains_method(&self, signature: &MethodSignature) -> bool {
        self.indices.contains_key(&ProgramLocation::entry(*signature))
    }

    pub fn method(&self, signature: &MethodSignature) -> Option<&CfaMethod> {
        self.methods.get(signature)
    }

    pub fn methods(&self) -> impl Iterator<Item = &CfaMethod> {
        self.methods.values()
    }

    pub fn contains(&self, location: &ProgramLocation) -> bool {
        self.indices.contains_key(location)
    }

    pub fn entry_node(&self, signature: &MethodSignature) -> Option<ProgramLocation> {
        let entry = ProgramLocation::entry(*signature);
        self.contains(&entry).then_some(entry)
    }

    pub fn exit_node(&self, signature: &MethodSignature) -> Option<ProgramLocation> {
        let exit = ProgramLocation::Exit(*signature);
        self.contains(&exit).then_some(exit)
    }

    pub fn unknown_node(&self) -> ProgramLocation {
        ProgramLocation::Unknown
    }

    /// All nodes of a method, in the order they were added.
    pub fn function_nodes(&self, signature: &MethodSignature) -> &[ProgramLocation] {
        self.function_nodes
            .get(signature)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn outgoing<'a>(
        &'a self,
        location: &ProgramLocation,
    ) -> impl Iterator<Item = CfaEdgeRef<'a>> + use<'a> {
        self.edges(location, Direction::Outgoing)
    }

    pub fn incoming<'a>(
        &'a self,
        location: &ProgramLocation,
    ) -> impl Iterator<Item = CfaEdgeRef<'a>> + use<'a> {
        self.edges(location, Direction::Incoming)
    }

    fn edges<'a>(
        &'a self,
        location: &ProgramLocation,
        direction: Direction,
    ) -> impl Iterator<Item = CfaEdgeRef<'a>> + use<'a> {
        let idx = self.indices.get(location).copied();
        idx.into_iter()
            .flat_map(move |idx| self.graph.edges_directed(idx, direction))
            .map(|e| CfaEdgeRef {
                source: self.graph[e.source()],
                target: self.graph[e.target()],
                edge: e.weight(),
            })
    }

    /// The interprocedural call edges leaving a call site.
    pub fn call_edges_from<'a>(
        &'a self,
        location: &ProgramLocation,
    ) -> impl Iterator<Item = &'a Call> + use<'a> {
        self.outgoing(location).filter_map(|e| e.edge.call())
    }

    /// The call edges entering the method `signature`.
    pub fn calls_to<'a>(
        &'a self,
        signature: &MethodSignature,
    ) -> impl Iterator<Item = &'a Call> + use<'a> {
        self.incoming(&ProgramLocation::entry(*signature))
            .filter_map(|e| e.edge.call())
    }

    /// The instruction executed at `location`, if it is a code location.
    pub fn instruction_at(&self, location: &ProgramLocation) -> Option<&Instruction> {
        self.outgoing(location)
            .map(|e| &e.edge.instruction)
            .next()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Drops all nodes and edges. Only the unknown node remains afterward.
    pub fn clear(&mut self) {
        tracing::debug!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "clearing control flow automaton"
        );
        self.graph.clear();
        self.indices.clear();
        self.methods.clear();
        self.function_nodes.clear();
        self.add_node(ProgramLocation::Unknown);
    }
}
