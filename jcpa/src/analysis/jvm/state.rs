use crate::analysis::cfa::{CfaMethod, ProgramLocation};
use crate::analysis::cpa::lattice::map::MapAbstractState;
use crate::analysis::cpa::lattice::set::SetAbstractState;
use crate::analysis::cpa::lattice::{JoinSemiLattice, product_cmp};
use crate::analysis::cpa::state::LocationState;
use crate::analysis::jvm::frame::JvmFrameAbstractState;
use crate::analysis::jvm::heap::JvmHeap;
use crate::analysis::jvm::reference::{Reference, ReferenceSlot};
use crate::analysis::jvm::{JvmAbstractValue, ValueSemantics};
use jcpa_bytecode::ValueKind;
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};

/// The abstract state of a JVM program at one location: the current frame, the heap and
/// the static fields, keyed by `Class.field`.
#[derive(Clone)]
pub struct JvmAbstractState<V, H> {
    location: ProgramLocation,
    pub frame: JvmFrameAbstractState<V>,
    pub heap: H,
    pub static_fields: MapAbstractState<String, V>,
}

impl<V: JvmAbstractValue, H: JvmHeap<V>> JvmAbstractState<V, H> {
    pub fn new(
        location: ProgramLocation,
        frame: JvmFrameAbstractState<V>,
        heap: H,
        static_fields: MapAbstractState<String, V>,
    ) -> Self {
        Self {
            location,
            frame,
            heap,
            static_fields,
        }
    }

    /// The state on entry of `method` when nothing is known about its caller: every
    /// reference parameter points to a distinct object created at the entry.
    pub fn entry<M: ValueSemantics<V>>(
        method: &CfaMethod,
        semantics: &M,
        heap: H,
        static_fields: MapAbstractState<String, V>,
    ) -> Self {
        let entry = ProgramLocation::entry(method.signature);
        let mut frame = JvmFrameAbstractState::new();
        let mut index = 0;
        if !method.is_static {
            let receiver = Reference::new(entry, ReferenceSlot::Local(0));
            frame.store(0, ValueKind::Reference, semantics.new_reference(receiver));
            index += 1;
        }
        for kind in &method.descriptor.parameters {
            let value = match kind {
                ValueKind::Reference => {
                    semantics.new_reference(Reference::new(entry, ReferenceSlot::Local(index)))
                }
                k => semantics.unknown(*k),
            };
            frame.store(index, *kind, value);
            index += kind.slots();
        }
        Self::new(entry, frame, heap, static_fields)
    }

    pub fn with_location(mut self, location: ProgramLocation) -> Self {
        self.location = location;
        self
    }

    pub fn set_location(&mut self, location: ProgramLocation) {
        self.location = location;
    }

    pub fn static_field(&self, name: &str) -> Option<&V> {
        self.static_fields.get(&name.to_string())
    }

    /// Replaces every frame and static field value whose references intersect `references`
    /// by the result of `update`.
    pub fn update_aliases<F: Fn(&V) -> V>(
        &mut self,
        references: &SetAbstractState<Reference>,
        update: F,
    ) {
        if references.is_empty() {
            return;
        }
        for value in self.frame.values_mut() {
            if value.references().intersects(references) {
                *value = update(value);
            }
        }
        self.static_fields.update_values(|_, value| {
            value
                .references()
                .intersects(references)
                .then(|| update(value))
        });
    }
}

impl<V: JvmAbstractValue, H: JvmHeap<V>> LocationState for JvmAbstractState<V, H> {
    fn location(&self) -> &ProgramLocation {
        &self.location
    }
}

impl<V: JvmAbstractValue, H: JvmHeap<V>> PartialEq for JvmAbstractState<V, H> {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location
            && self.frame == other.frame
            && self.heap == other.heap
            && self.static_fields == other.static_fields
    }
}

impl<V: JvmAbstractValue, H: JvmHeap<V>> Eq for JvmAbstractState<V, H> {}

impl<V: JvmAbstractValue, H: JvmHeap<V>> PartialOrd for JvmAbstractState<V, H> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.location != other.location {
            return None;
        }
        let frame = self.frame.partial_cmp(&other.frame);
        let heap = self.heap.partial_cmp(&other.heap);
        let statics = self.static_fields.partial_cmp(&other.static_fields);
        product_cmp(product_cmp(frame, heap), statics)
    }
}

impl<V: JvmAbstractValue, H: JvmHeap<V>> JoinSemiLattice for JvmAbstractState<V, H> {
    /// # Panics
    ///
    /// States at different program locations have no join.
    fn join(&mut self, other: &Self) {
        assert_eq!(
            self.location, other.location,
            "cannot join JVM states at different locations"
        );
        self.frame.join(&other.frame);
        self.heap.join(&other.heap);
        self.static_fields.join(&other.static_fields);
    }
}

impl<V: JvmAbstractValue, H: Debug> Debug for JvmAbstractState<V, H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JvmAbstractState")
            .field("location", &format_args!("{}", self.location))
            .field("locals", &self.frame.locals)
            .field("stack", &self.frame.operand_stack)
            .field("statics", &self.static_fields)
            .field("heap", &self.heap)
            .finish()
    }
}
