use crate::analysis::cpa::lattice::JoinSemiLattice;
use crate::analysis::cpa::lattice::map::{MapAbstractState, MapAbstractStateFactory};
use crate::analysis::cpa::lattice::set::SetAbstractState;
use crate::analysis::jvm::JvmAbstractValue;
use crate::analysis::jvm::heap::{
    FieldKey, HeapFactories, HeapNode, JvmHeap, ObjectKind, read_joined, retain_reachable,
    take_over, write,
};
use crate::analysis::jvm::reference::Reference;
use jcpa_bytecode::ValueKind;
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};

/// A field-sensitive object graph.
///
/// Field writes through a value referencing exactly one object overwrite the field; writes
/// through ambiguous references, and every array write, are joined into the old contents.
#[derive(Clone)]
pub struct TreeHeap<V> {
    nodes: MapAbstractState<Reference, HeapNode<V>>,
    node_factory: MapAbstractStateFactory<FieldKey, V>,
}

impl<V: JvmAbstractValue> TreeHeap<V> {
    pub fn new(factories: &HeapFactories<V>) -> Self {
        Self {
            nodes: factories.heap.create(),
            node_factory: factories.node.clone(),
        }
    }

    pub fn node(&self, reference: &Reference) -> Option<&HeapNode<V>> {
        self.nodes.get(reference)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn allocate(&mut self, reference: Reference, kind: ObjectKind) {
        if !self.nodes.contains_key(&reference) {
            let node = HeapNode::new(kind, self.node_factory.create());
            self.nodes.insert(reference, node);
        }
    }
}

impl<V: JvmAbstractValue> JvmHeap<V> for TreeHeap<V> {
    fn new_object(&mut self, reference: Reference) {
        self.allocate(reference, ObjectKind::Object)
    }

    fn new_array(&mut self, reference: Reference, element_kind: ValueKind) {
        self.allocate(reference, ObjectKind::Array(element_kind))
    }

    fn get_field(&self, object: &V, field: &str) -> Option<V> {
        read_joined(&self.nodes, object, &FieldKey::field(field), |_| true)
    }

    fn set_field(&mut self, object: &V, field: &str, value: V) {
        write(
            &mut self.nodes,
            &self.node_factory,
            object,
            FieldKey::field(field),
            value,
            ObjectKind::Object,
            true,
        )
    }

    fn get_array(&self, array: &V, _: ValueKind) -> Option<V> {
        read_joined(&self.nodes, array, &FieldKey::AnyIndex, |_| true)
    }

    fn set_array(&mut self, array: &V, element_kind: ValueKind, value: V) {
        write(
            &mut self.nodes,
            &self.node_factory,
            array,
            FieldKey::AnyIndex,
            value,
            ObjectKind::Array(element_kind),
            false,
        )
    }

    fn value_at(&self, reference: &Reference, key: &FieldKey) -> Option<V> {
        self.nodes.get(reference)?.get(key).cloned()
    }

    fn reduce(&mut self, roots: &SetAbstractState<Reference>) {
        retain_reachable(&mut self.nodes, roots)
    }

    fn expand(&mut self, callee: &Self) {
        take_over(&mut self.nodes, &callee.nodes)
    }
}

impl<V: JvmAbstractValue> PartialEq for TreeHeap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl<V: JvmAbstractValue> Eq for TreeHeap<V> {}

impl<V: JvmAbstractValue> PartialOrd for TreeHeap<V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.nodes.partial_cmp(&other.nodes)
    }
}

impl<V: JvmAbstractValue> JoinSemiLattice for TreeHeap<V> {
    fn join(&mut self, other: &Self) {
        self.nodes.join(&other.nodes)
    }
}

impl<V: JvmAbstractValue> Debug for TreeHeap<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TreeHeap{:?}", self.nodes)
    }
}
