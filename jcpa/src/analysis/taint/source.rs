use crate::analysis::cfa::Call;
use jcpa_bytecode::MethodSignature;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Restricts a source or sink to some of the calls of its method.
pub type CallPredicate = Arc<dyn Fn(&Call) -> bool + Send + Sync>;

fn same_predicate(a: &Option<CallPredicate>, b: &Option<CallPredicate>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

/// A method whose calls introduce taint.
#[derive(Clone, Serialize, Deserialize)]
pub struct TaintSource {
    pub signature: MethodSignature,
    #[serde(default)]
    pub taints_instance: bool,
    #[serde(default)]
    pub taints_return: bool,
    /// 1-based argument positions.
    #[serde(default)]
    pub taints_args: BTreeSet<usize>,
    /// Static fields, as `Class.field`.
    #[serde(default)]
    pub taints_globals: BTreeSet<String>,
    #[serde(skip)]
    pub predicate: Option<CallPredicate>,
}

impl TaintSource {
    /// A source that taints nothing yet; see the `tainting_*` methods.
    pub fn new(signature: MethodSignature) -> Self {
        Self {
            signature,
            taints_instance: false,
            taints_return: false,
            taints_args: BTreeSet::new(),
            taints_globals: BTreeSet::new(),
            predicate: None,
        }
    }

    pub fn tainting_return(mut self) -> Self {
        self.taints_return = true;
        self
    }

    pub fn tainting_instance(mut self) -> Self {
        self.taints_instance = true;
        self
    }

    pub fn tainting_args<I: IntoIterator<Item = usize>>(mut self, positions: I) -> Self {
        self.taints_args.extend(positions);
        self
    }

    pub fn tainting_globals<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.taints_globals.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_predicate<F: Fn(&Call) -> bool + Send + Sync + 'static>(mut self, predicate: F) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn applies_to(&self, call: &Call) -> bool {
        call.target == self.signature && self.predicate.as_ref().is_none_or(|p| p(call))
    }
}

impl PartialEq for TaintSource {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature
            && self.taints_instance == other.taints_instance
            && self.taints_return == other.taints_return
            && self.taints_args == other.taints_args
            && self.taints_globals == other.taints_globals
            && same_predicate(&self.predicate, &other.predicate)
    }
}

impl Eq for TaintSource {}

impl Hash for TaintSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signature.hash(state);
        self.taints_instance.hash(state);
        self.taints_return.hash(state);
        self.taints_args.hash(state);
        self.taints_globals.hash(state);
        if let Some(p) = &self.predicate {
            std::ptr::hash(Arc::as_ptr(p) as *const (), state);
        }
    }
}

impl Debug for TaintSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl Display for TaintSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.signature.method_name())
    }
}

/// A method whose calls must not receive tainted values.
#[derive(Clone, Serialize, Deserialize)]
pub struct TaintSink {
    pub signature: MethodSignature,
    #[serde(default)]
    pub takes_instance: bool,
    /// 1-based argument positions.
    #[serde(default)]
    pub takes_args: BTreeSet<usize>,
    #[serde(default)]
    pub takes_globals: BTreeSet<String>,
    #[serde(skip)]
    pub predicate: Option<CallPredicate>,
}

impl TaintSink {
    pub fn new(signature: MethodSignature) -> Self {
        Self {
            signature,
            takes_instance: false,
            takes_args: BTreeSet::new(),
            takes_globals: BTreeSet::new(),
            predicate: None,
        }
    }

    pub fn taking_instance(mut self) -> Self {
        self.takes_instance = true;
        self
    }

    pub fn taking_args<I: IntoIterator<Item = usize>>(mut self, positions: I) -> Self {
        self.takes_args.extend(positions);
        self
    }

    pub fn taking_globals<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.takes_globals.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_predicate<F: Fn(&Call) -> bool + Send + Sync + 'static>(mut self, predicate: F) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn applies_to(&self, call: &Call) -> bool {
        call.target == self.signature && self.predicate.as_ref().is_none_or(|p| p(call))
    }
}

impl PartialEq for TaintSink {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature
            && self.takes_instance == other.takes_instance
            && self.takes_args == other.takes_args
            && self.takes_globals == other.takes_globals
            && same_predicate(&self.predicate, &other.predicate)
    }
}

impl Eq for TaintSink {}

impl Hash for TaintSink {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signature.hash(state);
        self.takes_instance.hash(state);
        self.takes_args.hash(state);
        self.takes_globals.hash(state);
        if let Some(p) = &self.predicate {
            std::ptr::hash(Arc::as_ptr(p) as *const (), state);
        }
    }
}

impl Debug for TaintSink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "sink {}", self.signature)
    }
}

/// Sources and sinks as loaded from a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaintSpecification {
    #[serde(default)]
    pub sources: Vec<TaintSource>,
    #[serde(default)]
    pub sinks: Vec<TaintSink>,
}
