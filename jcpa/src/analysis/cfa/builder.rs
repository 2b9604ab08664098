use crate::analysis::cfa::{
    Call, CallGraph, CallResolver, CfaEdge, CfaEdgeKind, CfaMethod, JvmCfa, ProgramLocation,
    StaticCallResolver,
};
use crate::error::CpaError;
use jcpa_bytecode::{ClassPool, Instruction, MethodSignature};
use std::collections::VecDeque;
use tracing::info;

/// Builds a [`JvmCfa`] for every method with code in a class pool.
///
/// Call edges are taken from a call graph; without one, calls are resolved statically.
pub struct CfaBuilder<'a> {
    pool: &'a ClassPool,
    call_graph: Option<CallGraph>,
}

impl<'a> CfaBuilder<'a> {
    pub fn new(pool: &'a ClassPool) -> Self {
        Self {
            pool,
            call_graph: None,
        }
    }

    pub fn with_call_resolver<R: CallResolver + ?Sized>(mut self, resolver: &R) -> Self {
        self.call_graph = Some(resolver.resolve(self.pool));
        self
    }

    pub fn with_call_graph(mut self, call_graph: CallGraph) -> Self {
        self.call_graph = Some(call_graph);
        self
    }

    pub fn build(self) -> Result<JvmCfa, CpaError> {
        let mut cfa = JvmCfa::new();
        for (signature, method) in self.pool.methods() {
            let Some(code) = method.code.as_deref().filter(|c| !c.is_empty()) else {
                continue;
            };
            cfa.add_method(CfaMethod {
                signature,
                descriptor: method.parsed_descriptor()?,
                is_static: method.is_static,
                max_locals: method.max_locals,
            });
            add_method_body(&mut cfa, signature, code);
        }

        let call_graph = self
            .call_graph
            .unwrap_or_else(|| StaticCallResolver.resolve(self.pool));
        for (site, target) in call_graph.iter() {
            if !cfa.contains_method(&target) {
                continue;
            }
            let Some(instruction) = cfa.instruction_at(&site).cloned() else {
                continue;
            };
            let Instruction::Invoke { kind, .. } = instruction else {
                continue;
            };
            let call = Call::new(site, kind, target);
            let entry = ProgramLocation::entry(target);
            cfa.add_edge(site, entry, CfaEdge::new(CfaEdgeKind::Call(call), instruction));
        }
        info!(
            methods = cfa.methods().count(),
            nodes = cfa.node_count(),
            edges = cfa.edge_count(),
            "built control flow automaton"
        );
        Ok(cfa)
    }
}

/// Adds the nodes and intraprocedural edges of one method, visiting only reachable code.
fn add_method_body(cfa: &mut JvmCfa, signature: MethodSignature, code: &[Instruction]) {
    let exit = ProgramLocation::Exit(signature);
    let at = |offset: u32| {
        if (offset as usize) < code.len() {
            ProgramLocation::code(signature, offset)
        } else {
            ProgramLocation::Unknown
        }
    };
    cfa.add_node(ProgramLocation::entry(signature));
    cfa.add_node(exit);

    let mut visited = vec![false; code.len()];
    let mut queue = VecDeque::from([0u32]);
    visited[0] = true;
    while let Some(offset) = queue.pop_front() {
        let location = ProgramLocation::code(signature, offset);
        let instruction = &code[offset as usize];
        let mut successors = Vec::new();
        match instruction {
            Instruction::Return(_) | Instruction::Throw => {
                successors.push((CfaEdgeKind::Instruction, exit));
            }
            Instruction::Ret(_) => successors.push((CfaEdgeKind::Instruction, ProgramLocation::Unknown)),
            Instruction::Goto(target) | Instruction::Jsr(target) => {
                successors.push((CfaEdgeKind::Instruction, at(*target)));
            }
            Instruction::IfZero { target, .. } | Instruction::IfCompare { target, .. } => {
                successors.push((CfaEdgeKind::AssumeTaken, at(*target)));
                successors.push((CfaEdgeKind::AssumeNotTaken, at(offset + 1)));
            }
            Instruction::TableSwitch {
                default,
                low,
                targets,
            } => {
                for (i, target) in targets.iter().enumerate() {
                    let key = low.wrapping_add(i as i32);
                    successors.push((CfaEdgeKind::AssumeCase(key), at(*target)));
                }
                successors.push((CfaEdgeKind::AssumeDefault, at(*default)));
            }
            Instruction::LookupSwitch { default, pairs } => {
                for (key, target) in pairs {
                    successors.push((CfaEdgeKind::AssumeCase(*key), at(*target)));
                }
                successors.push((CfaEdgeKind::AssumeDefault, at(*default)));
            }
            _ => successors.push((CfaEdgeKind::Instruction, at(offset + 1))),
        }
        for (kind, target) in successors {
            cfa.add_edge(location, target, CfaEdge::new(kind, instruction.clone()));
            if let ProgramLocation::Code { offset, .. } = target {
                if !visited[offset as usize] {
                    visited[offset as usize] = true;
                    queue.push_back(offset);
                }
            }
        }
    }
}
