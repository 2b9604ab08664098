use crate::analysis::bam::{BamCache, BamCpa};
use crate::analysis::cfa::{JvmCfa, ProgramLocation};
use crate::analysis::cpa::lattice::JoinSemiLattice;
use crate::analysis::cpa::lattice::map::MapAbstractStateFactory;
use crate::analysis::cpa::operators::AbortOperator;
use crate::analysis::cpa::reached::ProgramLocationDependentReachedSet;
use crate::analysis::jvm::heap::{HeapFactories, HeapModel, JvmHeapAbstractState};
use crate::analysis::jvm::state::JvmAbstractState;
use crate::analysis::value::{ConstantSemantics, ValueAbstractValue};
use crate::error::CpaError;
use jcpa_bytecode::MethodSignature;
use tracing::info;

pub type ValueAbstractState =
    JvmAbstractState<ValueAbstractValue, JvmHeapAbstractState<ValueAbstractValue>>;

/// Constant propagation over the whole program reachable from one entry method.
pub struct ValueAnalyzer<'a> {
    cfa: &'a JvmCfa,
    main_signature: MethodSignature,
    heap_model: HeapModel,
    static_field_factory: MapAbstractStateFactory<String, ValueAbstractValue>,
    heap_factories: HeapFactories<ValueAbstractValue>,
    max_call_stack_depth: i32,
    reduce_heap: bool,
    abort: Option<Box<dyn AbortOperator + 'a>>,
}

impl<'a> ValueAnalyzer<'a> {
    pub fn builder() -> ValueAnalyzerBuilder<'a> {
        ValueAnalyzerBuilder::default()
    }

    pub fn analyze(self) -> Result<ValueAnalysisResult, CpaError> {
        let method = self
            .cfa
            .method(&self.main_signature)
            .ok_or(CpaError::UnknownMethod(self.main_signature))?;
        let semantics = ConstantSemantics;
        let mut bam = BamCpa::jvm(self.cfa, &semantics, self.reduce_heap)
            .with_max_call_stack_depth(self.max_call_stack_depth);
        if let Some(abort) = self.abort {
            bam = bam.with_boxed_abort(abort);
        }
        let entry = JvmAbstractState::entry(
            method,
            &semantics,
            JvmHeapAbstractState::new(self.heap_model, &self.heap_factories),
            self.static_field_factory.create(),
        );
        bam.analyze_block(self.main_signature, entry);
        let aborted = bam.aborted();
        let cache = bam.into_cache();
        info!(
            main = %self.main_signature,
            blocks = cache.len(),
            states = cache.reached_len(),
            aborted,
            "value analysis finished"
        );
        Ok(ValueAnalysisResult {
            main_signature: self.main_signature,
            cache,
            aborted,
        })
    }
}

pub struct ValueAnalyzerBuilder<'a> {
    cfa: Option<&'a JvmCfa>,
    main_signature: Option<MethodSignature>,
    heap_model: HeapModel,
    static_field_factory: MapAbstractStateFactory<String, ValueAbstractValue>,
    heap_factories: HeapFactories<ValueAbstractValue>,
    max_call_stack_depth: i32,
    reduce_heap: bool,
    abort: Option<Box<dyn AbortOperator + 'a>>,
}

impl Default for ValueAnalyzerBuilder<'_> {
    fn default() -> Self {
        Self {
            cfa: None,
            main_signature: None,
            heap_model: HeapModel::default(),
            static_field_factory: MapAbstractStateFactory::default(),
            heap_factories: HeapFactories::default(),
            max_call_stack_depth: -1,
            reduce_heap: false,
            abort: None,
        }
    }
}

impl<'a> ValueAnalyzerBuilder<'a> {
    pub fn cfa(mut self, cfa: &'a JvmCfa) -> Self {
        self.cfa = Some(cfa);
        self
    }

    pub fn main_signature(mut self, signature: MethodSignature) -> Self {
        self.main_signature = Some(signature);
        self
    }

    pub fn heap_model(mut self, model: HeapModel) -> Self {
        self.heap_model = model;
        self
    }

    pub fn static_field_factory(
        mut self,
        factory: MapAbstractStateFactory<String, ValueAbstractValue>,
    ) -> Self {
        self.static_field_factory = factory;
        self
    }

    pub fn heap_factories(mut self, factories: HeapFactories<ValueAbstractValue>) -> Self {
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

    pub fn abort<A: AbortOperator + 'a>(mut self, abort: A) -> Self {
        self.abort = Some(Box::new(abort));
        self
    }

    pub fn build(self) -> Result<ValueAnalyzer<'a>, CpaError> {
        let cfa = self.cfa.ok_or(CpaError::MissingField("cfa"))?;
        let main_signature = self
            .main_signature
            .ok_or(CpaError::MissingField("main_signature"))?;
        if !cfa.contains_method(&main_signature) {
            return Err(CpaError::UnknownMethod(main_signature));
        }
        Ok(ValueAnalyzer {
            cfa,
            main_signature,
            heap_model: self.heap_model,
            static_field_factory: self.static_field_factory,
            heap_factories: self.heap_factories,
            max_call_stack_depth: self.max_call_stack_depth,
            reduce_heap: self.reduce_heap,
            abort: self.abort,
        })
    }
}

pub struct ValueAnalysisResult {
    main_signature: MethodSignature,
    cache: BamCache<ValueAbstractState>,
    aborted: bool,
}

impl ValueAnalysisResult {
    pub fn cache(&self) -> &BamCache<ValueAbstractState> {
        &self.cache
    }

    /// The states reached in the entry method.
    pub fn main_reached(&self) -> Option<&ProgramLocationDependentReachedSet<ValueAbstractState>> {
        self.cache
            .entries_for(&self.main_signature)
            .first()
            .map(|e| &e.block.reached)
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Every state at `location`, over all analyzed contexts.
    pub fn states_at<'b>(
        &'b self,
        location: &'b ProgramLocation,
    ) -> impl Iterator<Item = &'b ValueAbstractState> {
        self.cache.states_at(location)
    }

    /// The local variable `index` before the instruction at `location`, joined over all
    /// contexts. `None` if the location was never reached.
    pub fn value_of_local(&self, location: &ProgramLocation, index: u16) -> Option<ValueAbstractValue> {
        self.joined(location, |s| s.frame.load(index))
    }

    /// The operand stack slot `depth` below the top before the instruction at `location`.
    pub fn value_of_stack(&self, location: &ProgramLocation, depth: u16) -> Option<ValueAbstractValue> {
        self.joined(location, |s| s.frame.peek(depth))
    }

    pub fn value_of_static(&self, location: &ProgramLocation, name: &str) -> Option<ValueAbstractValue> {
        self.joined(location, |s| {
            s.static_field(name)
                .cloned()
                .unwrap_or_else(ValueAbstractValue::top)
        })
    }

    fn joined<F>(&self, location: &ProgramLocation, read: F) -> Option<ValueAbstractValue>
    where
        F: Fn(&ValueAbstractState) -> ValueAbstractValue,
    {
        self.states_at(location).map(read).reduce(|mut a, b| {
            a.join(&b);
            a
        })
    }
}
