use crate::analysis::cfa::{
    CallGraph, CallResolver, CfaBuilder, CfaEdgeKind, ClassHierarchyCallResolver, JvmCfa,
    ProgramLocation, StaticCallResolver,
};
use jcpa_bytecode::builder::ClassBuilder;
use jcpa_bytecode::{ClassPool, Instruction, MethodSignature};

fn sig(class: &str, name: &str, descriptor: &str) -> MethodSignature {
    MethodSignature::new(class, name, descriptor)
}

fn pool() -> ClassPool {
    let a = ClassBuilder::new("A")
        .static_method("main", "()V", |code| {
            let other = code.new_label();
            let end = code.new_label();
            code.iconst(1)
                .ifeq(other)
                .invokestatic("A", "callee", "()I")
                .pop()
                .goto(end)
                .bind(other)
                .invokestatic("A", "lib", "()V")
                .bind(end)
                .return_void();
        })
        .static_method("callee", "()I", |code| {
            code.iconst(7).ireturn();
        })
        .static_method("choose", "(I)V", |code| {
            let zero = code.new_label();
            let one = code.new_label();
            let other = code.new_label();
            code.iload(0)
                .table_switch(0, &[zero, one], other)
                .bind(zero)
                .return_void()
                .bind(one)
                .return_void()
                .bind(other)
                .return_void();
        })
        .static_method("subroutine", "()V", |code| {
            let sub = code.new_label();
            code.jsr(sub).return_void().bind(sub).astore(0).ret(0);
        })
        .static_method("dead", "()V", |code| {
            let end = code.new_label();
            code.goto(end).nop().bind(end).nop();
        })
        .bodiless_method("lib", "()V", true)
        .build()
        .unwrap();
    let mut pool = ClassPool::new();
    pool.add_class(a).unwrap();
    pool
}

fn build() -> JvmCfa {
    CfaBuilder::new(&pool()).build().unwrap()
}

fn kinds_from(cfa: &JvmCfa, location: ProgramLocation) -> Vec<(CfaEdgeKind, ProgramLocation)> {
    cfa.outgoing(&location)
        .map(|e| (e.edge.kind.clone(), e.target))
        .collect()
}

#[test]
fn methods_without_code_have_no_nodes() {
    let cfa = build();
    let main = sig("A", "main", "()V");
    assert!(cfa.contains_method(&main));
    assert!(!cfa.contains_method(&sig("A", "lib", "()V")));
    assert_eq!(cfa.entry_node(&main), Some(ProgramLocation::entry(main)));
    assert_eq!(cfa.exit_node(&main), Some(ProgramLocation::Exit(main)));
    assert_eq!(cfa.method(&main).unwrap().parameter_slots(), 0);
    assert_eq!(cfa.method(&sig("A", "choose", "(I)V")).unwrap().parameter_slots(), 1);
}

#[test]
fn conditional_branches_become_assume_edges() {
    let cfa = build();
    let main = sig("A", "main", "()V");
    let edges = kinds_from(&cfa, ProgramLocation::code(main, 1));
    assert_eq!(
        edges
            .iter()
            .filter(|(k, _)| *k == CfaEdgeKind::AssumeTaken)
            .map(|(_, t)| *t)
            .collect::<Vec<_>>(),
        vec![ProgramLocation::code(main, 5)]
    );
    assert!(edges.contains(&(CfaEdgeKind::AssumeNotTaken, ProgramLocation::code(main, 2))));
    assert_eq!(
        kinds_from(&cfa, ProgramLocation::code(main, 6)),
        vec![(CfaEdgeKind::Instruction, ProgramLocation::Exit(main))]
    );
}

#[test]
fn resolved_calls_get_call_edges() {
    let cfa = build();
    let main = sig("A", "main", "()V");
    let callee = sig("A", "callee", "()I");
    let site = ProgramLocation::code(main, 2);

    let calls: Vec<_> = cfa.call_edges_from(&site).collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].target, callee);
    assert_eq!(calls[0].return_point(), Some(ProgramLocation::code(main, 3)));
    assert_eq!(cfa.calls_to(&callee).count(), 1);
    assert!(
        cfa.outgoing(&site)
            .any(|e| e.edge.kind == CfaEdgeKind::Instruction && e.target == ProgramLocation::code(main, 3))
    );

    // calls into bodiless methods only keep their intraprocedural edge
    let lib_site = ProgramLocation::code(main, 5);
    assert_eq!(cfa.call_edges_from(&lib_site).count(), 0);
    assert!(matches!(
        cfa.instruction_at(&lib_site),
        Some(Instruction::Invoke { .. })
    ));
}

#[test]
fn switch_cases_and_default() {
    let cfa = build();
    let choose = sig("A", "choose", "(I)V");
    let mut edges = kinds_from(&cfa, ProgramLocation::code(choose, 1));
    edges.sort_by_key(|(_, t)| *t);
    assert_eq!(
        edges,
        vec![
            (CfaEdgeKind::AssumeCase(0), ProgramLocation::code(choose, 2)),
            (CfaEdgeKind::AssumeCase(1), ProgramLocation::code(choose, 3)),
            (CfaEdgeKind::AssumeDefault, ProgramLocation::code(choose, 4)),
        ]
    );
}

#[test]
fn subroutine_return_is_unknown() {
    let cfa = build();
    let subroutine = sig("A", "subroutine", "()V");
    assert_eq!(
        kinds_from(&cfa, ProgramLocation::code(subroutine, 0)),
        vec![(CfaEdgeKind::Instruction, ProgramLocation::code(subroutine, 2))]
    );
    assert_eq!(
        kinds_from(&cfa, ProgramLocation::code(subroutine, 3)),
        vec![(CfaEdgeKind::Instruction, ProgramLocation::Unknown)]
    );
    // the return after jsr is never reached from the entry
    assert!(!cfa.contains(&ProgramLocation::code(subroutine, 1)));
}

#[test]
fn unreachable_code_is_skipped_and_falling_off_is_unknown() {
    let cfa = build();
    let dead = sig("A", "dead", "()V");
    assert!(!cfa.contains(&ProgramLocation::code(dead, 1)));
    assert_eq!(
        kinds_from(&cfa, ProgramLocation::code(dead, 2)),
        vec![(CfaEdgeKind::Instruction, ProgramLocation::Unknown)]
    );
    assert_eq!(
        cfa.function_nodes(&dead),
        &[
            ProgramLocation::entry(dead),
            ProgramLocation::Exit(dead),
            ProgramLocation::code(dead, 2)
        ]
    );
}

#[test]
fn clear_keeps_only_the_unknown_node() {
    let mut cfa = build();
    assert!(cfa.node_count() > 1);
    cfa.clear();
    assert_eq!(cfa.node_count(), 1);
    assert_eq!(cfa.edge_count(), 0);
    assert!(cfa.contains(&cfa.unknown_node()));
    assert_eq!(cfa.methods().count(), 0);
}

fn hierarchy() -> ClassPool {
    let base = ClassBuilder::new("Base")
        .instance_method("run", "()V", |code| {
            code.return_void();
        })
        .build()
        .unwrap();
    let derived = ClassBuilder::new("Derived")
        .extends("Base")
        .instance_method("run", "()V", |code| {
            code.return_void();
        })
        .build()
        .unwrap();
    let inherits = ClassBuilder::new("Inherits").extends("Base").build().unwrap();
    let main = ClassBuilder::new("Main")
        .static_method("main", "(LBase;)V", |code| {
            code.aload(0).invokevirtual("Base", "run", "()V").return_void();
        })
        .build()
        .unwrap();
    let mut pool = ClassPool::new();
    for class in [base, derived, inherits, main] {
        pool.add_class(class).unwrap();
    }
    pool
}

#[test]
fn class_hierarchy_resolution_adds_overrides() {
    let pool = hierarchy();
    let site = ProgramLocation::code(sig("Main", "main", "(LBase;)V"), 1);

    let static_graph = StaticCallResolver.resolve(&pool);
    assert_eq!(
        static_graph.targets(&site).collect::<Vec<_>>(),
        vec![sig("Base", "run", "()V")]
    );

    let cha = ClassHierarchyCallResolver.resolve(&pool);
    assert_eq!(
        cha.targets(&site).collect::<Vec<_>>(),
        vec![sig("Base", "run", "()V"), sig("Derived", "run", "()V")]
    );
    assert_eq!(cha.callers_of(sig("Derived", "run", "()V")).collect::<Vec<_>>(), vec![site]);

    let cfa = CfaBuilder::new(&pool)
        .with_call_resolver(&ClassHierarchyCallResolver)
        .build()
        .unwrap();
    assert_eq!(cfa.call_edges_from(&site).count(), 2);
}

#[test]
fn explicit_call_graph_replaces_resolution() {
    let pool = hierarchy();
    let site = ProgramLocation::code(sig("Main", "main", "(LBase;)V"), 1);
    let mut graph = CallGraph::new();
    graph.add(site, sig("Derived", "run", "()V"));
    let cfa = CfaBuilder::new(&pool).with_call_graph(graph).build().unwrap();
    let targets: Vec<_> = cfa.call_edges_from(&site).map(|c| c.target).collect();
    assert_eq!(targets, vec![sig("Derived", "run", "()V")]);
}
