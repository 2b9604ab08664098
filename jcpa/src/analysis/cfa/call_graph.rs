use crate::analysis::cfa::ProgramLocation;
use jcpa_bytecode::{ClassPool, InvokeKind, MethodSignature};
use std::collections::{BTreeMap, BTreeSet};

/// Maps call sites to the methods they may invoke.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallGraph {
    calls: BTreeMap<ProgramLocation, BTreeSet<MethodSignature>>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, call_site: ProgramLocation, target: MethodSignature) {
        self.calls.entry(call_site).or_default().insert(target);
    }

    pub fn targets(&self, call_site: &ProgramLocation) -> impl Iterator<Item = MethodSignature> + use<'_> {
        self.calls.get(call_site).into_iter().flatten().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProgramLocation, MethodSignature)> + '_ {
        self.calls
            .iter()
            .flat_map(|(site, targets)| targets.iter().map(move |t| (*site, *t)))
    }

    pub fn callers_of(&self, target: MethodSignature) -> impl Iterator<Item = ProgramLocation> + '_ {
        self.calls
            .iter()
            .filter(move |(_, targets)| targets.contains(&target))
            .map(|(site, _)| *site)
    }

    /// Number of call sites.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Discovers the call edges of a program.
pub trait CallResolver {
    fn resolve(&self, pool: &ClassPool) -> CallGraph;
}

/// Resolves every call to the method declaration found from its static receiver type.
#[derive(Debug, Default, Copy, Clone)]
pub struct StaticCallResolver;

/// Additionally resolves virtual and interface calls to the overriding methods of all
/// subtypes of the static receiver type.
#[derive(Debug, Default, Copy, Clone)]
pub struct ClassHierarchyCallResolver;

fn resolve_calls<F>(pool: &ClassPool, mut dispatch: F) -> CallGraph
where
    F: FnMut(InvokeKind, &MethodSignature, &mut dyn FnMut(MethodSignature)),
{
    let mut graph = CallGraph::new();
    for (signature, method) in pool.methods() {
        let Some(code) = &method.code else {
            continue;
        };
        for (offset, instruction) in code.iter().enumerate() {
            let Some((kind, target)) = instruction.invoked_method() else {
                continue;
            };
            let site = ProgramLocation::code(signature, offset as u32);
            dispatch(kind, &target, &mut |resolved| graph.add(site, resolved));
        }
    }
    tracing::debug!(call_sites = graph.len(), "resolved call graph");
    graph
}

fn resolve_declared(pool: &ClassPool, target: &MethodSignature) -> MethodSignature {
    pool.resolve_method(
        target.class_name(),
        target.method_name(),
        target.descriptor_str(),
    )
    .unwrap_or(*target)
}

impl CallResolver for StaticCallResolver {
    fn resolve(&self, pool: &ClassPool) -> CallGraph {
        resolve_calls(pool, |_, target, add| add(resolve_declared(pool, target)))
    }
}

impl CallResolver for ClassHierarchyCallResolver {
    fn resolve(&self, pool: &ClassPool) -> CallGraph {
        resolve_calls(pool, |kind, target, add| {
            add(resolve_declared(pool, target));
            if matches!(kind, InvokeKind::Virtual | InvokeKind::Interface) {
                for class in pool.subtypes_of(target.class_name()) {
                    if let Some(resolved) =
                        pool.resolve_method(&class.name, target.method_name(), target.descriptor_str())
                    {
                        add(resolved);
                    }
                }
            }
        })
    }
}
