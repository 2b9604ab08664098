//! Heap abstractions. Objects are identified by [`Reference`]s carried inside abstract
//! values; a heap maps them to [`HeapNode`]s holding the abstract values of their fields.

mod forgetful;
mod shallow;
mod tree;

pub use forgetful::ForgetfulHeap;
pub use shallow::ShallowHeap;
pub use tree::TreeHeap;

use crate::analysis::cpa::lattice::map::{MapAbstractState, MapAbstractStateFactory};
use crate::analysis::cpa::lattice::set::SetAbstractState;
use crate::analysis::cpa::lattice::flat::FlatLattice;
use crate::analysis::cpa::lattice::{BoundedJoinSemiLattice, JoinSemiLattice, product_cmp};
use crate::analysis::jvm::JvmAbstractValue;
use crate::analysis::jvm::reference::Reference;
use internment::Intern;
use jcpa_bytecode::ValueKind;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt::{Debug, Display, Formatter};

/// Selects the heap abstraction of an analysis.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "bin", derive(clap::ValueEnum))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeapModel {
    /// Nothing is stored; every read yields an unknown value.
    #[default]
    Forgetful,
    /// Arrays only, each collapsed to a single element.
    Shallow,
    /// A field-sensitive object graph.
    Tree,
    /// The object graph, with field reads and writes also moving taint between an object
    /// and its fields.
    TaintTree,
}

impl HeapModel {
    pub fn is_tree(self) -> bool {
        matches!(self, HeapModel::Tree | HeapModel::TaintTree)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Field(Intern<String>),
    /// Stands for every element of an array.
    AnyIndex,
}

impl FieldKey {
    pub fn field(name: &str) -> Self {
        Self::Field(Intern::new(name.to_string()))
    }

    fn key(&self) -> (u8, &str) {
        match self {
            Self::Field(name) => (0, name.as_str()),
            Self::AnyIndex => (1, ""),
        }
    }
}

impl PartialOrd for FieldKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(name) => write!(f, "{name}"),
            Self::AnyIndex => write!(f, "[*]"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Object,
    Array(ValueKind),
}

/// One abstract object. A reference that is used both as an object and as an array, or as
/// arrays of different element kinds, ends up with a `Top` kind.
#[derive(Clone)]
pub struct HeapNode<V> {
    pub kind: FlatLattice<ObjectKind>,
    pub fields: MapAbstractState<FieldKey, V>,
}

impl<V: JvmAbstractValue> HeapNode<V> {
    pub fn new(kind: ObjectKind, fields: MapAbstractState<FieldKey, V>) -> Self {
        Self {
            kind: FlatLattice::Value(kind),
            fields,
        }
    }

    pub fn get(&self, key: &FieldKey) -> Option<&V> {
        self.fields.get(key)
    }

    /// Whether this node may stand for an object of `kind`.
    pub fn admits(&self, kind: ObjectKind) -> bool {
        self.kind.value().is_none_or(|k| *k == kind)
    }
}

impl<V: JvmAbstractValue> PartialEq for HeapNode<V> {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.fields == other.fields
    }
}

impl<V: JvmAbstractValue> Eq for HeapNode<V> {}

impl<V: JvmAbstractValue> PartialOrd for HeapNode<V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        product_cmp(
            self.kind.partial_cmp(&other.kind),
            self.fields.partial_cmp(&other.fields),
        )
    }
}

impl<V: JvmAbstractValue> JoinSemiLattice for HeapNode<V> {
    fn join(&mut self, other: &Self) {
        self.kind.join(&other.kind);
        self.fields.join(&other.fields);
    }
}

impl<V: JvmAbstractValue> BoundedJoinSemiLattice for HeapNode<V> {
    fn bottom() -> Self {
        Self {
            kind: FlatLattice::Bottom,
            fields: MapAbstractState::new(),
        }
    }

    fn is_bottom(&self) -> bool {
        self.kind.is_bottom() && self.fields.is_bottom()
    }
}

impl<V: JvmAbstractValue> Debug for HeapNode<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            FlatLattice::Value(kind) => write!(f, "{kind:?}{:?}", self.fields),
            kind => write!(f, "{kind:?}{:?}", self.fields),
        }
    }
}

/// The map strategies used for the heap and for the fields of each object.
#[derive(Debug, Clone)]
pub struct HeapFactories<V> {
    pub heap: MapAbstractStateFactory<Reference, HeapNode<V>>,
    pub node: MapAbstractStateFactory<FieldKey, V>,
}

impl<V> Default for HeapFactories<V> {
    fn default() -> Self {
        Self {
            heap: MapAbstractStateFactory::default(),
            node: MapAbstractStateFactory::default(),
        }
    }
}

/// Operations the transfer relation and the call operators perform on a heap.
///
/// Objects are addressed through abstract values: an access affects every object the value
/// may reference. Reads return `None` when the heap knows nothing about the accessed slot.
pub trait JvmHeap<V: JvmAbstractValue>: JoinSemiLattice + Clone + Debug {
    fn new_object(&mut self, reference: Reference);

    fn new_array(&mut self, reference: Reference, element_kind: ValueKind);

    fn get_field(&self, object: &V, field: &str) -> Option<V>;

    fn set_field(&mut self, object: &V, field: &str, value: V);

    fn get_array(&self, array: &V, element_kind: ValueKind) -> Option<V>;

    fn set_array(&mut self, array: &V, element_kind: ValueKind, value: V);

    /// The value stored in one field of one object.
    fn value_at(&self, reference: &Reference, key: &FieldKey) -> Option<V>;

    /// Drops every object that cannot be reached from `roots`.
    fn reduce(&mut self, roots: &SetAbstractState<Reference>);

    /// Takes over the objects of a callee's exit heap, keeping objects the callee never saw.
    fn expand(&mut self, callee: &Self);
}

/// Joins the values of `key` over every object `value` references. Objects lacking the
/// key contribute an unknown value.
fn read_joined<V: JvmAbstractValue>(
    nodes: &MapAbstractState<Reference, HeapNode<V>>,
    value: &V,
    key: &FieldKey,
    accept: impl Fn(&HeapNode<V>) -> bool,
) -> Option<V> {
    let mut result: Option<V> = None;
    let mut missing = false;
    for reference in value.references() {
        match nodes.get(reference) {
            Some(node) if !accept(node) => {}
            Some(node) => match (node.get(key), result.as_mut()) {
                (Some(v), Some(r)) => r.join(v),
                (Some(v), None) => result = Some(v.clone()),
                (None, _) => missing = true,
            },
            None => missing = true,
        }
    }
    match result {
        Some(mut r) if missing => {
            r.join(&V::unknown());
            Some(r)
        }
        r => r,
    }
}

/// Writes `value` to `key` of every object `target` references. With `strong`, a single
/// referenced object is overwritten; otherwise values are joined.
fn write<V: JvmAbstractValue>(
    nodes: &mut MapAbstractState<Reference, HeapNode<V>>,
    factory: &MapAbstractStateFactory<FieldKey, V>,
    target: &V,
    key: FieldKey,
    value: V,
    kind: ObjectKind,
    strong: bool,
) {
    let strong = strong && target.references().len() == 1;
    for reference in target.references() {
        let mut node = nodes
            .get(reference)
            .cloned()
            .unwrap_or_else(|| HeapNode::new(kind, factory.create()));
        let written = match node.fields.get(&key) {
            Some(old) if !strong => {
                let mut joined = old.clone();
                joined.join(&value);
                joined
            }
            _ => value.clone(),
        };
        node.fields.insert(key.clone(), written);
        nodes.insert(reference.clone(), node);
    }
}

fn retain_reachable<V: JvmAbstractValue>(
    nodes: &mut MapAbstractState<Reference, HeapNode<V>>,
    roots: &SetAbstractState<Reference>,
) {
    let mut reachable: HashSet<Reference> = HashSet::new();
    let mut queue: Vec<Reference> = roots.iter().cloned().collect();
    while let Some(reference) = queue.pop() {
        if !reachable.insert(reference.clone()) {
            continue;
        }
        if let Some(node) = nodes.get(&reference) {
            for value in node.fields.values() {
                queue.extend(value.references().iter().cloned());
            }
        }
    }
    let before = nodes.len();
    nodes.retain(|reference, _| reachable.contains(reference));
    tracing::trace!(before, after = nodes.len(), "reduced heap");
}

fn take_over<V: JvmAbstractValue>(
    nodes: &mut MapAbstractState<Reference, HeapNode<V>>,
    callee: &MapAbstractState<Reference, HeapNode<V>>,
) {
    for (reference, node) in callee.iter() {
        nodes.insert(reference.clone(), node.clone());
    }
}

/// A heap of any model, chosen at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JvmHeapAbstractState<V: JvmAbstractValue> {
    Forgetful(ForgetfulHeap),
    Shallow(ShallowHeap<V>),
    Tree(TreeHeap<V>),
}

impl<V: JvmAbstractValue> JvmHeapAbstractState<V> {
    pub fn new(model: HeapModel, factories: &HeapFactories<V>) -> Self {
        match model {
            HeapModel::Forgetful => Self::Forgetful(ForgetfulHeap),
            HeapModel::Shallow => Self::Shallow(ShallowHeap::new(factories)),
            HeapModel::Tree | HeapModel::TaintTree => Self::Tree(TreeHeap::new(factories)),
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $heap:ident => $body:expr) => {
        match $self {
            JvmHeapAbstractState::Forgetful($heap) => $body,
            JvmHeapAbstractState::Shallow($heap) => $body,
            JvmHeapAbstractState::Tree($heap) => $body,
        }
    };
}

impl<V: JvmAbstractValue> PartialOrd for JvmHeapAbstractState<V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Forgetful(a), Self::Forgetful(b)) => a.partial_cmp(b),
            (Self::Shallow(a), Self::Shallow(b)) => a.partial_cmp(b),
            (Self::Tree(a), Self::Tree(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl<V: JvmAbstractValue> JoinSemiLattice for JvmHeapAbstractState<V> {
    fn join(&mut self, other: &Self) {
        match (self, other) {
            (Self::Forgetful(a), Self::Forgetful(b)) => a.join(b),
            (Self::Shallow(a), Self::Shallow(b)) => a.join(b),
            (Self::Tree(a), Self::Tree(b)) => a.join(b),
            _ => panic!("cannot join heaps of different models"),
        }
    }
}

impl<V: JvmAbstractValue> JvmHeap<V> for JvmHeapAbstractState<V> {
    fn new_object(&mut self, reference: Reference) {
        dispatch!(self, h => JvmHeap::<V>::new_object(h, reference))
    }

    fn new_array(&mut self, reference: Reference, element_kind: ValueKind) {
        dispatch!(self, h => JvmHeap::<V>::new_array(h, reference, element_kind))
    }

    fn get_field(&self, object: &V, field: &str) -> Option<V> {
        dispatch!(self, h => JvmHeap::<V>::get_field(h, object, field))
    }

    fn set_field(&mut self, object: &V, field: &str, value: V) {
        dispatch!(self, h => JvmHeap::<V>::set_field(h, object, field, value))
    }

    fn get_array(&self, array: &V, element_kind: ValueKind) -> Option<V> {
        dispatch!(self, h => JvmHeap::<V>::get_array(h, array, element_kind))
    }

    fn set_array(&mut self, array: &V, element_kind: ValueKind, value: V) {
        dispatch!(self, h => JvmHeap::<V>::set_array(h, array, element_kind, value))
    }

    fn value_at(&self, reference: &Reference, key: &FieldKey) -> Option<V> {
        dispatch!(self, h => JvmHeap::<V>::value_at(h, reference, key))
    }

    fn reduce(&mut self, roots: &SetAbstractState<Reference>) {
        dispatch!(self, h => JvmHeap::<V>::reduce(h, roots))
    }

    fn expand(&mut self, callee: &Self) {
        match (self, callee) {
            (Self::Forgetful(_), Self::Forgetful(_)) => {}
            (Self::Shallow(a), Self::Shallow(b)) => a.expand(b),
            (Self::Tree(a), Self::Tree(b)) => a.expand(b),
            _ => panic!("cannot expand a heap with a heap of a different model"),
        }
    }
}
