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

/// Tracks arrays only, each collapsed to a single element slot. Object fields are not
/// tracked at all.
///
/// Accesses whose element kind does not match the kind the array was created with are
/// ignored on write and unknown on read.
#[derive(Clone)]
pub struct ShallowHeap<V> {
    arrays: MapAbstractState<Reference, HeapNode<V>>,
    node_factory: MapAbstractStateFactory<FieldKey, V>,
}

impl<V: JvmAbstractValue> ShallowHeap<V> {
    pub fn new(factories: &HeapFactories<V>) -> Self {
        Self {
            arrays: factories.heap.create(),
            node_factory: factories.node.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}

impl<V: JvmAbstractValue> JvmHeap<V> for ShallowHeap<V> {
    fn new_object(&mut self, _: Reference) {}

    fn new_array(&mut self, reference: Reference, element_kind: ValueKind) {
        if !self.arrays.contains_key(&reference) {
            let node = HeapNode::new(ObjectKind::Array(element_kind), self.node_factory.create());
            self.arrays.insert(reference, node);
        }
    }

    fn get_field(&self, _: &V, _: &str) -> Option<V> {
        None
    }

    fn set_field(&mut self, _: &V, _: &str, _: V) {}

    fn get_array(&self, array: &V, element_kind: ValueKind) -> Option<V> {
        let kind = ObjectKind::Array(element_kind);
        read_joined(&self.arrays, array, &FieldKey::AnyIndex, |node| {
            node.admits(kind)
        })
    }

    fn set_array(&mut self, array: &V, element_kind: ValueKind, value: V) {
        let kind = ObjectKind::Array(element_kind);
        let matching: SetAbstractState<Reference> = array
            .references()
            .iter()
            .filter(|r| self.arrays.get(r).is_none_or(|node| node.admits(kind)))
            .cloned()
            .collect();
        let target = array.clone().with_references(matching);
        write(
            &mut self.arrays,
            &self.node_factory,
            &target,
            FieldKey::AnyIndex,
            value,
            kind,
            false,
        );
    }

    fn value_at(&self, reference: &Reference, key: &FieldKey) -> Option<V> {
        self.arrays.get(reference)?.get(key).cloned()
    }

    fn reduce(&mut self, roots: &SetAbstractState<Reference>) {
        retain_reachable(&mut self.arrays, roots)
    }

    fn expand(&mut self, callee: &Self) {
        take_over(&mut self.arrays, &callee.arrays)
    }
}

impl<V: JvmAbstractValue> PartialEq for ShallowHeap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.arrays == other.arrays
    }
}

impl<V: JvmAbstractValue> Eq for ShallowHeap<V> {}

impl<V: JvmAbstractValue> PartialOrd for ShallowHeap<V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.arrays.partial_cmp(&other.arrays)
    }
}

impl<V: JvmAbstractValue> JoinSemiLattice for ShallowHeap<V> {
    fn join(&mut self, other: &Self) {
        self.arrays.join(&other.arrays)
    }
}

impl<V: JvmAbstractValue> Debug for ShallowHeap<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShallowHeap{:?}", self.arrays)
    }
}
