//! Constant propagation: a small value domain, used to check the JVM transfer relation
//! and the interprocedural machinery independently of taint tracking.

mod analyzer;
mod domain;

pub use analyzer::{ValueAnalysisResult, ValueAbstractState, ValueAnalyzer, ValueAnalyzerBuilder};
pub use domain::{ConstantSemantics, ValueAbstractValue};
