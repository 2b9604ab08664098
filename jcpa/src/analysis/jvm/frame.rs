use crate::analysis::cpa::lattice::list::ListAbstractState;
use crate::analysis::cpa::lattice::stack::StackAbstractState;
use crate::analysis::cpa::lattice::{JoinSemiLattice, product_cmp};
use crate::analysis::jvm::JvmAbstractValue;
use jcpa_bytecode::{Instruction, ValueKind};
use std::cmp::Ordering;

/// Local variables and operand stack of one method activation.
///
/// Category-2 values occupy two slots: the value itself, followed by a padding value. On the
/// stack the padding lies on top; in the locals it sits at the following index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JvmFrameAbstractState<V> {
    pub locals: ListAbstractState<V>,
    pub operand_stack: StackAbstractState<V>,
}

impl<V: JvmAbstractValue> Default for JvmFrameAbstractState<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: JvmAbstractValue> JvmFrameAbstractState<V> {
    pub fn new() -> Self {
        Self {
            locals: ListAbstractState::new(),
            operand_stack: StackAbstractState::new(),
        }
    }

    pub fn push(&mut self, value: V) {
        self.operand_stack.push(value)
    }

    /// Pushes a value of `kind`, followed by padding for category-2 kinds.
    pub fn push_value(&mut self, kind: ValueKind, value: V) {
        self.operand_stack.push(value);
        if kind.is_category2() {
            self.operand_stack.push(V::padding());
        }
    }

    /// Pops one slot. An empty stack yields an unknown value.
    pub fn pop(&mut self) -> V {
        self.operand_stack.pop_or_default(V::unknown())
    }

    /// Pops a value of `kind`, discarding its padding first.
    pub fn pop_value(&mut self, kind: ValueKind) -> V {
        if kind.is_category2() {
            self.pop();
        }
        self.pop()
    }

    pub fn pop_slots(&mut self, slots: u16) -> Vec<V> {
        (0..slots).map(|_| self.pop()).collect()
    }

    /// The slot `depth` positions below the top of the stack.
    pub fn peek(&self, depth: u16) -> V {
        self.operand_stack
            .peek_or_default(usize::from(depth), V::unknown())
    }

    pub fn load(&self, index: u16) -> V {
        self.locals
            .get_or_default(usize::from(index), V::unknown())
    }

    /// Stores a value of `kind` at `index`, writing its padding to `index + 1` for
    /// category-2 kinds.
    pub fn store(&mut self, index: u16, kind: ValueKind, value: V) {
        let index = usize::from(index);
        self.locals.set(index, value, V::unknown());
        if kind.is_category2() {
            self.locals.set(index + 1, V::padding(), V::unknown());
        }
    }

    /// Every value of the frame, locals first.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.locals.iter_mut().chain(self.operand_stack.iter_mut())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.locals.iter().chain(self.operand_stack.iter())
    }

    /// Applies a `dup`/`swap` style instruction. Returns false for any other instruction.
    pub fn shuffle(&mut self, instruction: &Instruction) -> bool {
        let Some(pattern) = stack_shuffle(instruction) else {
            return false;
        };
        let popped = self.pop_slots(pattern.popped);
        for &slot in pattern.pushed {
            self.push(popped[slot].clone());
        }
        true
    }
}

/// How a stack manipulation instruction rearranges the slots it touches.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StackShuffle {
    /// Number of slots popped.
    pub popped: u16,
    /// The slots pushed, base first; each entry is the depth the slot was popped from.
    pub pushed: &'static [usize],
}

impl StackShuffle {
    /// The depth, before the instruction, of the slot found at `depth` after it.
    pub fn origin(&self, depth: u16) -> Option<u16> {
        let len = self.pushed.len();
        let index = len.checked_sub(usize::from(depth) + 1)?;
        Some(self.pushed[index] as u16)
    }
}

pub fn stack_shuffle(instruction: &Instruction) -> Option<StackShuffle> {
    let (popped, pushed): (u16, &'static [usize]) = match instruction {
        Instruction::Dup => (1, &[0, 0]),
        Instruction::DupX1 => (2, &[0, 1, 0]),
        Instruction::DupX2 => (3, &[0, 2, 1, 0]),
        Instruction::Dup2 => (2, &[1, 0, 1, 0]),
        Instruction::Dup2X1 => (3, &[1, 0, 2, 1, 0]),
        Instruction::Dup2X2 => (4, &[1, 0, 3, 2, 1, 0]),
        Instruction::Swap => (2, &[0, 1]),
        _ => return None,
    };
    Some(StackShuffle { popped, pushed })
}

impl<V: JvmAbstractValue> PartialOrd for JvmFrameAbstractState<V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        product_cmp(
            self.locals.partial_cmp(&other.locals),
            self.operand_stack.partial_cmp(&other.operand_stack),
        )
    }
}

impl<V: JvmAbstractValue> JoinSemiLattice for JvmFrameAbstractState<V> {
    fn join(&mut self, other: &Self) {
        self.locals.join(&other.locals);
        self.operand_stack.join(&other.operand_stack);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::taint::TaintValue;

    fn tagged(tag: &str) -> TaintValue {
        TaintValue::tainted_by(crate::analysis::taint::TaintSource::new(
            jcpa_bytecode::MethodSignature::new("T", tag, "()V"),
        ))
    }

    #[test]
    fn category2_values_carry_padding() {
        let mut frame = JvmFrameAbstractState::new();
        frame.push_value(ValueKind::Long, tagged("a"));
        assert_eq!(frame.operand_stack.len(), 2);
        assert!(frame.peek(0).is_padding());
        assert_eq!(frame.pop_value(ValueKind::Long), tagged("a"));
        assert!(frame.operand_stack.is_empty());

        frame.store(1, ValueKind::Double, tagged("b"));
        assert_eq!(frame.locals.len(), 3);
        assert_eq!(frame.load(1), tagged("b"));
        assert!(frame.load(2).is_padding());
        assert_eq!(frame.load(0), TaintValue::unknown());
    }

    #[test]
    fn shuffles_follow_the_slot_tables() {
        let mut frame = JvmFrameAbstractState::new();
        frame.push(tagged("c"));
        frame.push(tagged("b"));
        frame.push(tagged("a"));
        assert!(frame.shuffle(&Instruction::DupX2));
        let order: Vec<_> = frame.operand_stack.iter().cloned().collect();
        assert_eq!(
            order,
            vec![tagged("a"), tagged("c"), tagged("b"), tagged("a")]
        );
        assert!(frame.shuffle(&Instruction::Swap));
        assert_eq!(frame.peek(0), tagged("b"));
        assert_eq!(frame.peek(1), tagged("a"));
        assert!(!frame.shuffle(&Instruction::Pop));

        let dup2_x1 = stack_shuffle(&Instruction::Dup2X1).unwrap();
        assert_eq!(dup2_x1.origin(0), Some(0));
        assert_eq!(dup2_x1.origin(2), Some(2));
        assert_eq!(dup2_x1.origin(4), Some(1));
        assert_eq!(dup2_x1.origin(5), None);
    }
}
