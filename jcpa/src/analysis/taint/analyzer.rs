use crate::analysis::bam::{BamCache, BamCpa};
use crate::analysis::cfa::JvmCfa;
use crate::analysis::cpa::lattice::map::MapAbstractStateFactory;
use crate::analysis::cpa::lattice::set::SetAbstractState;
use crate::analysis::cpa::operators::AbortOperator;
use crate::analysis::cpa::reached::ProgramLocationDependentReachedSet;
use crate::analysis::jvm::heap::{HeapFactories, HeapModel, JvmHeapAbstractState};
use crate::analysis::jvm::state::JvmAbstractState;
use crate::analysis::taint::endpoint::Endpoints;
use crate::analysis::taint::{
    PropagationTarget, TaintEndpoint, TaintSemantics, TaintSink, TaintSource, TaintTransformer,
    TaintValue,
};
use crate::analysis::trace::{JvmMemoryLocationTransferRelation, LinearTrace, TraceExtractor};
use crate::error::CpaError;
use jcpa_bytecode::MethodSignature;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{info, instrument};

pub type TaintAbstractState = JvmAbstractState<TaintValue, JvmHeapAbstractState<TaintValue>>;

/// Traces extracted per endpoint unless the builder says otherwise.
pub const DEFAULT_MAX_TRACES_PER_ENDPOINT: usize = 64;

/// Taint analysis of everything reachable from one entry method.
///
/// ```no_run
/// # use jcpa::analysis::cfa::JvmCfa;
/// # use jcpa::analysis::taint::{TaintAnalyzer, TaintSink, TaintSource};
/// # use jcpa::bytecode::MethodSignature;
/// # fn run(cfa: &JvmCfa) -> Result<(), jcpa::CpaError> {
/// let source = MethodSignature::new("A", "source", "()Ljava/lang/String;");
/// let sink = MethodSignature::new("A", "sink", "(Ljava/lang/String;)V");
/// let result = TaintAnalyzer::builder()
///     .cfa(cfa)
///     .main_signature(MethodSignature::new("A", "main", "()V"))
///     .sources([TaintSource::new(source).tainting_return()])
///     .sinks([TaintSink::new(sink).taking_args([1])])
///     .build()?
///     .analyze()?;
/// for trace in result.extract_linear_traces() {
///     println!("{trace}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct TaintAnalyzer<'a> {
    cfa: &'a JvmCfa,
    main_signature: MethodSignature,
    sinks: Vec<TaintSink>,
    semantics: TaintSemantics,
    heap_model: HeapModel,
    static_field_factory: MapAbstractStateFactory<String, TaintValue>,
    heap_factories: HeapFactories<TaintValue>,
    max_call_stack_depth: i32,
    reduce_heap: bool,
    max_traces_per_endpoint: Option<usize>,
    abort: Option<Box<dyn AbortOperator + 'a>>,
}

impl<'a> TaintAnalyzer<'a> {
    pub fn builder() -> TaintAnalyzerBuilder<'a> {
        TaintAnalyzerBuilder::default()
    }

    #[instrument(skip_all, fields(main = %self.main_signature))]
    pub fn analyze(self) -> Result<TaintAnalysisResult<'a>, CpaError> {
        let method = self
            .cfa
            .method(&self.main_signature)
            .ok_or(CpaError::UnknownMethod(self.main_signature))?;
        let mut bam = BamCpa::jvm(self.cfa, &self.semantics, self.reduce_heap)
            .with_max_call_stack_depth(self.max_call_stack_depth);
        if let Some(abort) = self.abort {
            bam = bam.with_boxed_abort(abort);
        }
        let entry = JvmAbstractState::entry(
            method,
            &self.semantics,
            JvmHeapAbstractState::new(self.heap_model, &self.heap_factories),
            self.static_field_factory.create(),
        );
        bam.analyze_block(self.main_signature, entry);
        let aborted = bam.aborted();
        let cache = bam.into_cache();
        let endpoints = Endpoints::collect(self.cfa, &self.sinks, cache.states());
        info!(
            blocks = cache.len(),
            states = cache.reached_len(),
            endpoints = endpoints.sinks.len(),
            aborted,
            "taint analysis finished"
        );
        Ok(TaintAnalysisResult {
            cfa: self.cfa,
            main_signature: self.main_signature,
            semantics: self.semantics,
            cache,
            endpoints,
            aborted,
            max_traces_per_endpoint: self.max_traces_per_endpoint,
        })
    }
}

pub struct TaintAnalyzerBuilder<'a> {
    cfa: Option<&'a JvmCfa>,
    main_signature: Option<MethodSignature>,
    sources: Vec<TaintSource>,
    sinks: Vec<TaintSink>,
    heap_model: HeapModel,
    static_field_factory: MapAbstractStateFactory<String, TaintValue>,
    heap_factories: HeapFactories<TaintValue>,
    max_call_stack_depth: i32,
    reduce_heap: bool,
    max_traces_per_endpoint: Option<usize>,
    extra_propagation: HashMap<MethodSignature, BTreeSet<PropagationTarget>>,
    transformers: HashMap<MethodSignature, TaintTransformer>,
    abort: Option<Box<dyn AbortOperator + 'a>>,
}

impl Default for TaintAnalyzerBuilder<'_> {
    fn default() -> Self {
        Self {
            cfa: None,
            main_signature: None,
            sources: Vec::new(),
            sinks: Vec::new(),
            heap_model: HeapModel::default(),
            static_field_factory: MapAbstractStateFactory::default(),
            heap_factories: HeapFactories::default(),
            max_call_stack_depth: -1,
            reduce_heap: false,
            max_traces_per_endpoint: Some(DEFAULT_MAX_TRACES_PER_ENDPOINT),
            extra_propagation: HashMap::new(),
            transformers: HashMap::new(),
            abort: None,
        }
    }
}

impl<'a> TaintAnalyzerBuilder<'a> {
    pub fn cfa(mut self, cfa: &'a JvmCfa) -> Self {
        self.cfa = Some(cfa);
        self
    }

    pub fn main_signature(mut self, signature: MethodSignature) -> Self {
        self.main_signature = Some(signature);
        self
    }

    pub fn sources<I: IntoIterator<Item = TaintSource>>(mut self, sources: I) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn sinks<I: IntoIterator<Item = TaintSink>>(mut self, sinks: I) -> Self {
        self.sinks.extend(sinks);
        self
    }

    pub fn heap_model(mut self, model: HeapModel) -> Self {
        self.heap_model = model;
        self
    }

    pub fn static_field_factory(mut self, factory: MapAbstractStateFactory<String, TaintValue>) -> Self {
        self.static_field_factory = factory;
        self
    }

    pub fn heap_factories(mut self, factories: HeapFactories<TaintValue>) -> Self {
        self.heap_factories = factories;
        self
    }

    /// Negative for no limit, 0 to analyze the entry method only.
    pub fn max_call_stack_depth(mut self, depth: i32) -> Self {
        self.max_call_stack_depth = depth;
        self
    }

    pub fn reduce_heap(mut self, reduce: bool) -> Self {
        self.reduce_heap = reduce;
        self
    }

    /// Where the taint of the inputs of an unanalyzed call to `method` goes, instead of
    /// its return value.
    pub fn extra_propagation<I>(mut self, method: MethodSignature, targets: I) -> Self
    where
        I: IntoIterator<Item = PropagationTarget>,
    {
        self.extra_propagation
            .entry(method)
            .or_default()
            .extend(targets);
        self
    }

    /// Bounds the traces extracted for each endpoint; `None` extracts all of them.
    pub fn max_traces_per_endpoint(mut self, max: Option<usize>) -> Self {
        self.max_traces_per_endpoint = max;
        self
    }

    pub fn transformer(mut self, method: MethodSignature, transformer: TaintTransformer) -> Self {
        self.transformers.insert(method, transformer);
        self
    }

    pub fn abort<A: AbortOperator + 'a>(mut self, abort: A) -> Self {
        self.abort = Some(Box::new(abort));
        self
    }

    pub fn build(self) -> Result<TaintAnalyzer<'a>, CpaError> {
        let cfa = self.cfa.ok_or(CpaError::MissingField("cfa"))?;
        let main_signature = self
            .main_signature
            .ok_or(CpaError::MissingField("main_signature"))?;
        if !cfa.contains_method(&main_signature) {
            return Err(CpaError::UnknownMethod(main_signature));
        }
        let semantics = TaintSemantics::new(self.sources)
            .with_propagation(self.extra_propagation)
            .with_transformers(self.transformers)
            .with_object_taint(self.heap_model == HeapModel::TaintTree);
        Ok(TaintAnalyzer {
            cfa,
            main_signature,
            sinks: self.sinks,
            semantics,
            heap_model: self.heap_model,
            static_field_factory: self.static_field_factory,
            heap_factories: self.heap_factories,
            max_call_stack_depth: self.max_call_stack_depth,
            reduce_heap: self.reduce_heap,
            max_traces_per_endpoint: self.max_traces_per_endpoint,
            abort: self.abort,
        })
    }
}

pub struct TaintAnalysisResult<'a> {
    cfa: &'a JvmCfa,
    main_signature: MethodSignature,
    semantics: TaintSemantics,
    cache: BamCache<TaintAbstractState>,
    endpoints: Endpoints,
    aborted: bool,
    max_traces_per_endpoint: Option<usize>,
}

impl TaintAnalysisResult<'_> {
    pub fn cache(&self) -> &BamCache<TaintAbstractState> {
        &self.cache
    }

    /// The states reached in the entry method.
    pub fn main_reached(&self) -> Option<&ProgramLocationDependentReachedSet<TaintAbstractState>> {
        self.cache
            .entries_for(&self.main_signature)
            .first()
            .map(|e| &e.block.reached)
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &TaintEndpoint> {
        self.endpoints.sinks.keys()
    }

    /// The sinks each endpoint triggers.
    pub fn endpoint_sinks(&self) -> &BTreeMap<TaintEndpoint, Vec<TaintSink>> {
        &self.endpoints.sinks
    }

    /// The sources whose taint reaches each endpoint.
    pub fn endpoint_taints(&self) -> &BTreeMap<TaintEndpoint, SetAbstractState<TaintSource>> {
        &self.endpoints.taints
    }

    /// The paths tainted values take from a source into an endpoint, up to the configured
    /// number per endpoint.
    pub fn extract_linear_traces(&self) -> Vec<LinearTrace> {
        let relevant = |v: &TaintValue| v.is_tainted();
        let relation =
            JvmMemoryLocationTransferRelation::new(self.cfa, &self.cache, &self.semantics, &relevant);
        let mut extractor = TraceExtractor::new(relation);
        if let Some(max) = self.max_traces_per_endpoint {
            extractor = extractor.with_max_traces(max);
        }
        self.endpoints()
            .flat_map(|e| extractor.extract(e.step()))
            .collect()
    }
}
