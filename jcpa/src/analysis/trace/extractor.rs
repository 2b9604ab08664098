use crate::analysis::jvm::heap::JvmHeap;
use crate::analysis::jvm::JvmAbstractValue;
use crate::analysis::trace::{JvmMemoryLocationTransferRelation, TraceStep};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use tracing::debug;

/// A path of memory locations from an endpoint, at index 0, back to the origin its value
/// came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinearTrace {
    pub steps: Vec<TraceStep>,
}

impl LinearTrace {
    /// Each step as `(kind, detail, location)` strings, endpoint first.
    pub fn render(&self) -> Vec<(String, String, String)> {
        self.steps
            .iter()
            .map(|s| {
                (
                    s.memory.kind().to_string(),
                    s.memory.detail(),
                    s.location.to_string(),
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TraceStep> {
        self.steps.iter()
    }

    pub fn endpoint(&self) -> Option<&TraceStep> {
        self.steps.first()
    }

    pub fn origin(&self) -> Option<&TraceStep> {
        self.steps.last()
    }
}

impl Display for LinearTrace {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " <- ")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// Walks a [`JvmMemoryLocationTransferRelation`] backwards from an endpoint and collects
/// every acyclic path that reaches an origin.
pub struct TraceExtractor<'a, V, H> {
    relation: JvmMemoryLocationTransferRelation<'a, V, H>,
    max_traces: Option<usize>,
}

impl<'a, V: JvmAbstractValue, H: JvmHeap<V>> TraceExtractor<'a, V, H> {
    pub fn new(relation: JvmMemoryLocationTransferRelation<'a, V, H>) -> Self {
        Self {
            relation,
            max_traces: None,
        }
    }

    /// Stops extraction once `max` traces have been found.
    pub fn with_max_traces(mut self, max: usize) -> Self {
        self.max_traces = Some(max);
        self
    }

    pub fn extract(&self, endpoint: TraceStep) -> Vec<LinearTrace> {
        let mut traces = Vec::new();
        if !self.relation.is_relevant(&endpoint) {
            debug!(%endpoint, "endpoint holds no relevant value");
            return traces;
        }
        let mut path = vec![endpoint];
        let mut visited = HashSet::new();
        self.walk(&mut path, &mut visited, &mut traces);
        debug!(traces = traces.len(), "extracted traces");
        traces
    }

    fn is_full(&self, traces: &[LinearTrace]) -> bool {
        self.max_traces.is_some_and(|max| traces.len() >= max)
    }

    fn walk(
        &self,
        path: &mut Vec<TraceStep>,
        visited: &mut HashSet<TraceStep>,
        traces: &mut Vec<LinearTrace>,
    ) {
        let Some(current) = path.last().cloned() else {
            return;
        };
        if self.is_full(traces) || !visited.insert(current.clone()) {
            return;
        }
        let steps = self.relation.predecessors(&current);
        if steps.origin {
            traces.push(LinearTrace {
                steps: path.clone(),
            });
        }
        for predecessor in steps.predecessors {
            path.push(predecessor);
            self.walk(path, visited, traces);
            path.pop();
        }
        visited.remove(&current);
    }
}
