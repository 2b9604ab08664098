use crate::analysis::cfa::ProgramLocation;
use internment::Intern;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// Where a reference was first observed at its creation site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceSlot {
    /// Operand stack position, counted from the base of the stack.
    Stack(u16),
    Local(u16),
    StaticField(Intern<String>),
    Unknown,
}

impl ReferenceSlot {
    fn key(&self) -> (u8, u16, &str) {
        match self {
            Self::Stack(i) => (0, *i, ""),
            Self::Local(i) => (1, *i, ""),
            Self::StaticField(name) => (2, 0, name.as_str()),
            Self::Unknown => (3, 0, ""),
        }
    }
}

impl PartialOrd for ReferenceSlot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReferenceSlot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Display for ReferenceSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stack(i) => write!(f, "stack[{i}]"),
            Self::Local(i) => write!(f, "local[{i}]"),
            Self::StaticField(name) => write!(f, "static[{name}]"),
            Self::Unknown => write!(f, "?"),
        }
    }
}

/// An abstract heap object, identified by the place it was created at.
///
/// References are plain values: heaps use them as map keys, so object graphs never own
/// each other and cycles need no special treatment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    pub creation: ProgramLocation,
    pub slot: ReferenceSlot,
}

impl Reference {
    pub fn new(creation: ProgramLocation, slot: ReferenceSlot) -> Self {
        Self { creation, slot }
    }

    pub fn static_field(creation: ProgramLocation, name: &str) -> Self {
        Self::new(creation, ReferenceSlot::StaticField(Intern::new(name.to_string())))
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.slot, self.creation)
    }
}
