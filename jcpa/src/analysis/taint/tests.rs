use crate::analysis::cfa::{Call, CfaBuilder, JvmCfa, ProgramLocation};
use crate::analysis::cpa::lattice::set::SetAbstractState;
use crate::analysis::jvm::heap::HeapModel;
use crate::analysis::taint::{
    PropagationTarget, TaintAnalysisResult, TaintAnalyzer, TaintAnalyzerBuilder, TaintEndpoint,
    TaintSink, TaintSource, TaintTransformer,
};
use crate::analysis::trace::{LinearTrace, MemoryLocation, TraceStep};
use crate::error::CpaError;
use jcpa_bytecode::builder::{ClassBuilder, CodeBuilder};
use jcpa_bytecode::{ClassPool, MethodSignature, ValueKind};
use std::sync::Arc;

const STRING_SOURCE: &str = "()Ljava/lang/String;";
const STRING_SINK: &str = "(Ljava/lang/String;)V";

fn main_sig() -> MethodSignature {
    MethodSignature::new("A", "main", "()V")
}

fn at(offset: u32) -> ProgramLocation {
    ProgramLocation::code(main_sig(), offset)
}

fn source(name: &str) -> TaintSource {
    TaintSource::new(MethodSignature::new("A", name, STRING_SOURCE)).tainting_return()
}

fn sink() -> TaintSink {
    TaintSink::new(MethodSignature::new("A", "sink", STRING_SINK)).taking_args([1])
}

/// A class with the bodiless source and sink methods, plus whatever `extra` adds.
fn library(extra: impl FnOnce(ClassBuilder) -> ClassBuilder) -> ClassBuilder {
    extra(
        ClassBuilder::new("A")
            .bodiless_method("source1", STRING_SOURCE, true)
            .bodiless_method("source2", STRING_SOURCE, true)
            .bodiless_method("sink", STRING_SINK, true),
    )
}

fn cfa_with<F: FnOnce(&mut CodeBuilder)>(main: F, class: ClassBuilder) -> JvmCfa {
    let class = class.static_method("main", "()V", main).build().unwrap();
    let mut pool = ClassPool::new();
    pool.add_class(class).unwrap();
    CfaBuilder::new(&pool).build().unwrap()
}

fn builder(cfa: &JvmCfa) -> TaintAnalyzerBuilder<'_> {
    TaintAnalyzer::builder()
        .cfa(cfa)
        .main_signature(main_sig())
        .sources([source("source1"), source("source2")])
        .sinks([sink()])
}

fn analyze(cfa: &JvmCfa) -> TaintAnalysisResult<'_> {
    builder(cfa).build().unwrap().analyze().unwrap()
}

fn stack_top(offset: u32) -> TaintEndpoint {
    TaintEndpoint::new(at(offset), MemoryLocation::Stack(0))
}

fn source_names(result: &TaintAnalysisResult<'_>, endpoint: &TaintEndpoint) -> Vec<String> {
    let mut names: Vec<String> = result.endpoint_taints()[endpoint]
        .iter()
        .map(|s| s.signature.method_name().to_string())
        .collect();
    names.sort();
    names
}

fn source_to_local_to_sink(code: &mut CodeBuilder) {
    code.invokestatic("A", "source1", STRING_SOURCE)
        .astore(0)
        .aload(0)
        .invokestatic("A", "sink", STRING_SINK)
        .return_void();
}

#[test]
fn source_reaches_sink_through_a_local() {
    let cfa = cfa_with(source_to_local_to_sink, library(|c| c));
    let result = analyze(&cfa);
    let endpoints: Vec<&TaintEndpoint> = result.endpoints().collect();
    assert_eq!(endpoints, vec![&stack_top(3)]);
    assert_eq!(source_names(&result, &stack_top(3)), vec!["source1"]);
    assert_eq!(result.endpoint_sinks()[&stack_top(3)], vec![sink()]);
    assert!(result.main_reached().is_some());
    assert!(!result.aborted());
}

#[test]
fn overwritten_taint_does_not_reach_sink() {
    let cfa = cfa_with(
        |code| {
            code.invokestatic("A", "source1", STRING_SOURCE)
                .astore(0)
                .ldc_string("")
                .astore(0)
                .aload(0)
                .invokestatic("A", "sink", STRING_SINK)
                .return_void();
        },
        library(|c| c),
    );
    let result = analyze(&cfa);
    assert_eq!(result.endpoints().count(), 0);
    assert!(result.extract_linear_traces().is_empty());
}

#[test]
fn branches_join_their_taints() {
    let cfa = cfa_with(
        |code| {
            let other = code.new_label();
            let end = code.new_label();
            code.iconst(0)
                .ifeq(other)
                .invokestatic("A", "source1", STRING_SOURCE)
                .astore(0)
                .goto(end)
                .bind(other)
                .invokestatic("A", "source2", STRING_SOURCE)
                .astore(0)
                .bind(end)
                .aload(0)
                .invokestatic("A", "sink", STRING_SINK)
                .return_void();
        },
        library(|c| c),
    );
    let result = analyze(&cfa);
    assert_eq!(source_names(&result, &stack_top(8)), vec!["source1", "source2"]);
    let traces = result.extract_linear_traces();
    assert_eq!(traces.len(), 2);
    let origins: Vec<ProgramLocation> = traces
        .iter()
        .filter_map(|t| t.origin().map(|s| s.location))
        .collect();
    assert!(origins.contains(&at(3)));
    assert!(origins.contains(&at(6)));
}

#[test]
fn trace_follows_the_value_back_to_its_source() {
    let cfa = cfa_with(source_to_local_to_sink, library(|c| c));
    let traces = analyze(&cfa).extract_linear_traces();
    assert_eq!(traces.len(), 1);
    assert_eq!(
        traces[0].steps,
        vec![
            TraceStep::new(MemoryLocation::Stack(0), at(3)),
            TraceStep::new(MemoryLocation::Local(0), at(2)),
            TraceStep::new(MemoryLocation::Stack(0), at(1)),
        ]
    );
    let rendered = traces[0].render();
    assert_eq!(rendered[1].0, "local");
    assert_eq!(rendered[1].1, "0");
    assert_eq!(rendered[1].2, at(2).to_string());
}

#[test]
fn trace_crosses_into_callees() {
    let callee = MethodSignature::new("A", "callee", STRING_SOURCE);
    let class = library(|c| {
        c.static_method("callee", STRING_SOURCE, |code| {
            code.invokestatic("A", "source1", STRING_SOURCE).areturn();
        })
    });
    let cfa = cfa_with(
        |code| {
            code.invokestatic("A", "callee", STRING_SOURCE)
                .invokestatic("A", "sink", STRING_SINK)
                .return_void();
        },
        class,
    );
    let traces: Vec<LinearTrace> = analyze(&cfa).extract_linear_traces();
    assert_eq!(traces.len(), 1);
    assert_eq!(
        traces[0].steps,
        vec![
            TraceStep::new(MemoryLocation::Stack(0), at(1)),
            TraceStep::new(MemoryLocation::Stack(0), ProgramLocation::Exit(callee)),
            TraceStep::new(MemoryLocation::Stack(0), ProgramLocation::code(callee, 1)),
        ]
    );
}

#[test]
fn calls_beyond_the_depth_limit_hide_their_sources() {
    let class = library(|c| {
        c.static_method("callee", STRING_SOURCE, |code| {
            code.invokestatic("A", "source1", STRING_SOURCE).areturn();
        })
    });
    let cfa = cfa_with(
        |code| {
            code.invokestatic("A", "callee", STRING_SOURCE)
                .invokestatic("A", "sink", STRING_SINK)
                .return_void();
        },
        class,
    );
    let result = builder(&cfa)
        .max_call_stack_depth(0)
        .build()
        .unwrap()
        .analyze()
        .unwrap();
    assert_eq!(result.endpoints().count(), 0);
}

#[test]
fn global_sources_reach_global_sinks() {
    let class = ClassBuilder::new("A")
        .bodiless_method("read", "()V", true)
        .bodiless_method("write", "()V", true);
    let cfa = cfa_with(
        |code| {
            code.invokestatic("A", "read", "()V")
                .invokestatic("A", "write", "()V")
                .return_void();
        },
        class,
    );
    let result = TaintAnalyzer::builder()
        .cfa(&cfa)
        .main_signature(main_sig())
        .sources([TaintSource::new(MethodSignature::new("A", "read", "()V")).tainting_globals(["A.out"])])
        .sinks([TaintSink::new(MethodSignature::new("A", "write", "()V")).taking_globals(["A.out"])])
        .build()
        .unwrap()
        .analyze()
        .unwrap();
    let endpoint = TaintEndpoint::new(at(1), MemoryLocation::Static("A.out".to_string()));
    assert_eq!(result.endpoints().collect::<Vec<_>>(), vec![&endpoint]);
    let traces = result.extract_linear_traces();
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].steps, vec![endpoint.step()]);
}

#[test]
fn extra_propagation_replaces_the_default_flow() {
    let wrap = MethodSignature::new("A", "wrap", "(Ljava/lang/String;)Ljava/lang/String;");
    let class = library(|c| c.bodiless_method("wrap", "(Ljava/lang/String;)Ljava/lang/String;", true));
    let cfa = cfa_with(
        |code| {
            code.invokestatic("A", "source1", STRING_SOURCE)
                .invokestatic("A", "wrap", "(Ljava/lang/String;)Ljava/lang/String;")
                .invokestatic("A", "sink", STRING_SINK)
                .return_void();
        },
        class,
    );
    let default = analyze(&cfa);
    assert_eq!(source_names(&default, &stack_top(2)), vec!["source1"]);
    let traces = default.extract_linear_traces();
    assert_eq!(traces.len(), 1);
    assert_eq!(
        traces[0].origin(),
        Some(&TraceStep::new(MemoryLocation::Stack(0), at(1)))
    );

    let sanitized = builder(&cfa)
        .extra_propagation(wrap, [PropagationTarget::Argument(1)])
        .build()
        .unwrap()
        .analyze()
        .unwrap();
    assert_eq!(sanitized.endpoints().count(), 0);
}

fn field_round_trip(code: &mut CodeBuilder) {
    code.new_object("A")
        .astore(0)
        .aload(0)
        .invokestatic("A", "source1", STRING_SOURCE)
        .putfield("A", "f", "Ljava/lang/String;")
        .aload(0)
        .getfield("A", "f", "Ljava/lang/String;")
        .invokestatic("A", "sink", STRING_SINK)
        .return_void();
}

#[test]
fn tree_heap_carries_taint_through_fields() {
    let cfa = cfa_with(field_round_trip, library(|c| c));
    let forgetful = analyze(&cfa);
    assert_eq!(forgetful.endpoints().count(), 0);

    let tree = builder(&cfa).heap_model(HeapModel::Tree).build().unwrap().analyze().unwrap();
    assert_eq!(source_names(&tree, &stack_top(7)), vec!["source1"]);
    let traces = tree.extract_linear_traces();
    assert_eq!(traces.len(), 1);
    let steps = &traces[0].steps;
    assert_eq!(steps.len(), 4);
    assert!(matches!(steps[1].memory, MemoryLocation::Heap(..)));
    assert_eq!(steps[1].location, at(6));
    assert_eq!(steps[3], TraceStep::new(MemoryLocation::Stack(0), at(4)));
}

#[test]
fn builder_reports_missing_and_unknown_inputs() {
    assert!(matches!(
        TaintAnalyzer::builder().main_signature(main_sig()).build(),
        Err(CpaError::MissingField("cfa"))
    ));
    let cfa = cfa_with(source_to_local_to_sink, library(|c| c));
    assert!(matches!(
        TaintAnalyzer::builder().cfa(&cfa).build(),
        Err(CpaError::MissingField("main_signature"))
    ));
    let missing = MethodSignature::new("B", "main", "()V");
    assert!(matches!(
        TaintAnalyzer::builder().cfa(&cfa).main_signature(missing).build(),
        Err(CpaError::UnknownMethod(m)) if m == missing
    ));
}

#[test]
fn trace_count_is_bounded_per_endpoint() {
    let cfa = cfa_with(
        |code| {
            let other = code.new_label();
            let end = code.new_label();
            code.iconst(0)
                .ifeq(other)
                .invokestatic("A", "source1", STRING_SOURCE)
                .astore(0)
                .goto(end)
                .bind(other)
                .invokestatic("A", "source2", STRING_SOURCE)
                .astore(0)
                .bind(end)
                .aload(0)
                .invokestatic("A", "sink", STRING_SINK)
                .return_void();
        },
        library(|c| c),
    );
    let bounded = builder(&cfa)
        .max_traces_per_endpoint(Some(1))
        .build()
        .unwrap()
        .analyze()
        .unwrap();
    assert_eq!(bounded.extract_linear_traces().len(), 1);
    let unbounded = builder(&cfa)
        .max_traces_per_endpoint(None)
        .build()
        .unwrap()
        .analyze()
        .unwrap();
    assert_eq!(unbounded.extract_linear_traces().len(), 2);
}

const ESCAPE: &str = "(Ljava/lang/String;)Ljava/lang/String;";

#[test]
fn transformers_sanitize_flows_into_sinks() {
    let escape = MethodSignature::new("A", "escape", ESCAPE);
    let class = library(|c| c.bodiless_method("escape", ESCAPE, true));
    let cfa = cfa_with(
        |code| {
            code.invokestatic("A", "source1", STRING_SOURCE)
                .invokestatic("A", "escape", ESCAPE)
                .invokestatic("A", "sink", STRING_SINK)
                .return_void();
        },
        class,
    );
    assert_eq!(source_names(&analyze(&cfa), &stack_top(2)), vec!["source1"]);

    let clear: TaintTransformer = Arc::new(
        |_: &Call, _: SetAbstractState<TaintSource>| -> SetAbstractState<TaintSource> {
            SetAbstractState::new()
        },
    );
    let sanitized = builder(&cfa)
        .transformer(escape, clear)
        .build()
        .unwrap()
        .analyze()
        .unwrap();
    assert_eq!(sanitized.endpoints().count(), 0);

    let only_source2: TaintTransformer = Arc::new(
        |_: &Call, taints: SetAbstractState<TaintSource>| -> SetAbstractState<TaintSource> {
            taints
                .iter()
                .filter(|s| s.signature.method_name() == "source2")
                .cloned()
                .collect()
        },
    );
    let filtered = builder(&cfa)
        .transformer(escape, only_source2)
        .build()
        .unwrap()
        .analyze()
        .unwrap();
    assert_eq!(filtered.endpoints().count(), 0);
}

fn array_round_trip(code: &mut CodeBuilder) {
    code.iconst(1)
        .newarray(ValueKind::Reference)
        .astore(0)
        .aload(0)
        .iconst(0)
        .invokestatic("A", "source1", STRING_SOURCE)
        .array_store(ValueKind::Reference)
        .aload(0)
        .iconst(0)
        .array_load(ValueKind::Reference)
        .invokestatic("A", "sink", STRING_SINK)
        .return_void();
}

#[test]
fn shallow_heap_carries_taint_through_arrays() {
    let cfa = cfa_with(array_round_trip, library(|c| c));
    assert_eq!(analyze(&cfa).endpoints().count(), 0);

    let shallow = builder(&cfa)
        .heap_model(HeapModel::Shallow)
        .build()
        .unwrap()
        .analyze()
        .unwrap();
    assert_eq!(source_names(&shallow, &stack_top(10)), vec!["source1"]);
    let traces = shallow.extract_linear_traces();
    assert_eq!(traces.len(), 1);
    assert_eq!(
        traces[0].origin(),
        Some(&TraceStep::new(MemoryLocation::Stack(0), at(6)))
    );
}

const OBJECT_ARG: &str = "(LA;)V";

fn fill() -> TaintSource {
    TaintSource::new(MethodSignature::new("A", "fill", OBJECT_ARG)).tainting_args([1])
}

fn object_sink() -> TaintSink {
    TaintSink::new(MethodSignature::new("A", "consume", OBJECT_ARG)).taking_args([1])
}

fn object_library(extra: impl FnOnce(ClassBuilder) -> ClassBuilder) -> ClassBuilder {
    extra(
        ClassBuilder::new("A")
            .bodiless_method("fill", OBJECT_ARG, true)
            .bodiless_method("consume", OBJECT_ARG, true),
    )
}

/// Creates an object, hands it to `filler`, then to the sink.
fn fill_then_consume(filler: &'static str) -> impl FnOnce(&mut CodeBuilder) {
    move |code| {
        code.new_object("A")
            .astore(0)
            .aload(0)
            .invokestatic("A", filler, OBJECT_ARG)
            .aload(0)
            .invokestatic("A", "consume", OBJECT_ARG)
            .return_void();
    }
}

fn analyze_objects(cfa: &JvmCfa, model: HeapModel) -> TaintAnalysisResult<'_> {
    TaintAnalyzer::builder()
        .cfa(cfa)
        .main_signature(main_sig())
        .sources([fill()])
        .sinks([object_sink()])
        .heap_model(model)
        .build()
        .unwrap()
        .analyze()
        .unwrap()
}

#[test]
fn argument_sources_taint_the_passed_object() {
    let cfa = cfa_with(fill_then_consume("fill"), object_library(|c| c));
    for model in [HeapModel::Forgetful, HeapModel::TaintTree] {
        let result = analyze_objects(&cfa, model);
        assert_eq!(result.endpoints().collect::<Vec<_>>(), vec![&stack_top(5)]);
        let traces = result.extract_linear_traces();
        assert_eq!(traces.len(), 1);
        assert_eq!(
            traces[0].steps,
            vec![
                TraceStep::new(MemoryLocation::Stack(0), at(5)),
                TraceStep::new(MemoryLocation::Local(0), at(4)),
            ]
        );
    }
}

#[test]
fn callee_taint_on_an_argument_object_returns_to_the_caller() {
    let helper = MethodSignature::new("A", "helper", OBJECT_ARG);
    let class = object_library(|c| {
        c.static_method("helper", OBJECT_ARG, |code| {
            code.aload(0)
                .invokestatic("A", "fill", OBJECT_ARG)
                .return_void();
        })
    });
    let cfa = cfa_with(fill_then_consume("helper"), class);
    for model in [HeapModel::Forgetful, HeapModel::TaintTree] {
        let result = analyze_objects(&cfa, model);
        assert_eq!(result.endpoints().collect::<Vec<_>>(), vec![&stack_top(5)]);
        let traces = result.extract_linear_traces();
        assert_eq!(traces.len(), 1);
        assert_eq!(
            traces[0].steps,
            vec![
                TraceStep::new(MemoryLocation::Stack(0), at(5)),
                TraceStep::new(MemoryLocation::Local(0), at(4)),
                TraceStep::new(MemoryLocation::Local(0), ProgramLocation::Exit(helper)),
                TraceStep::new(MemoryLocation::Local(0), ProgramLocation::code(helper, 2)),
            ]
        );
    }
}
