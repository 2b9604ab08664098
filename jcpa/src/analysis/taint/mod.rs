//! Taint tracking on top of the JVM analysis.
//!
//! Values carry the set of [`TaintSource`]s they were derived from. After the
//! interprocedural fixpoint, every tainted value read by a [`TaintSink`] becomes a
//! [`TaintEndpoint`], from which [`LinearTrace`](crate::analysis::trace::LinearTrace)s back
//! to the sources can be extracted.

mod analyzer;
mod endpoint;
mod semantics;
mod source;
#[cfg(test)]
mod tests;
mod value;

pub use analyzer::{
    DEFAULT_MAX_TRACES_PER_ENDPOINT, TaintAbstractState, TaintAnalysisResult, TaintAnalyzer,
    TaintAnalyzerBuilder,
};
pub use endpoint::TaintEndpoint;
pub use semantics::{PropagationTarget, TaintSemantics, TaintTransformer};
pub use source::{CallPredicate, TaintSink, TaintSource, TaintSpecification};
pub use value::TaintValue;
