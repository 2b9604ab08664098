use crate::signature::{FieldRef, MethodSignature};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The computational type of a value on the operand stack or in a local variable.
///
/// `Long` and `Double` are category-2 values: they occupy two consecutive
/// slots. Sub-int types (`byte`, `char`, `short`, `boolean`) are `Int`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl ValueKind {
    pub fn slots(self) -> u16 {
        if self.is_category2() { 2 } else { 1 }
    }

    pub fn is_category2(self) -> bool {
        matches!(self, ValueKind::Long | ValueKind::Double)
    }

    fn prefix(self) -> char {
        match self {
            ValueKind::Int => 'i',
            ValueKind::Long => 'l',
            ValueKind::Float => 'f',
            ValueKind::Double => 'd',
            ValueKind::Reference => 'a',
        }
    }
}

/// A constant pushed by `*const`, `bipush`, `sipush` or `ldc`.
///
/// Floating point constants are stored as their IEEE bit patterns so that
/// instructions stay `Eq` and `Hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constant {
    Null,
    Int(i32),
    Long(i64),
    Float(u32),
    Double(u64),
    String(String),
    Class(String),
}

impl Constant {
    pub fn kind(&self) -> ValueKind {
        match self {
            Constant::Int(_) => ValueKind::Int,
            Constant::Long(_) => ValueKind::Long,
            Constant::Float(_) => ValueKind::Float,
            Constant::Double(_) => ValueKind::Double,
            Constant::Null | Constant::String(_) | Constant::Class(_) => ValueKind::Reference,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    UShr,
    And,
    Or,
    Xor,
}

impl ArithmeticOp {
    /// Shifts always take an `int` shift distance, even for `long` operands.
    pub fn is_shift(self) -> bool {
        matches!(self, ArithmeticOp::Shl | ArithmeticOp::Shr | ArithmeticOp::UShr)
    }
}

/// Branch conditions. `Null` and `NonNull` are only meaningful for
/// [`Instruction::IfZero`] on references.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
    Null,
    NonNull,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvokeKind {
    Static,
    Virtual,
    Special,
    Interface,
    Dynamic,
}

impl InvokeKind {
    /// Whether the call consumes an implicit receiver.
    pub fn has_receiver(self) -> bool {
        !matches!(self, InvokeKind::Static | InvokeKind::Dynamic)
    }
}

/// One instruction of the stack machine. Branch targets are instruction
/// offsets within the owning method's code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    Nop,
    Constant(Constant),
    Load {
        kind: ValueKind,
        index: u16,
    },
    Store {
        kind: ValueKind,
        index: u16,
    },
    Increment {
        index: u16,
        delta: i32,
    },
    ArrayLoad(ValueKind),
    ArrayStore(ValueKind),
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    Arithmetic {
        op: ArithmeticOp,
        kind: ValueKind,
    },
    Negate(ValueKind),
    Convert {
        from: ValueKind,
        to: ValueKind,
    },
    /// `lcmp`, `fcmp*`, `dcmp*`
    Compare(ValueKind),
    /// Compares the top of the stack against zero (or null).
    IfZero {
        condition: Condition,
        target: u32,
    },
    /// Compares the two topmost values.
    IfCompare {
        condition: Condition,
        kind: ValueKind,
        target: u32,
    },
    Goto(u32),
    Jsr(u32),
    Ret(u16),
    TableSwitch {
        default: u32,
        low: i32,
        targets: Vec<u32>,
    },
    LookupSwitch {
        default: u32,
        pairs: Vec<(i32, u32)>,
    },
    Return(Option<ValueKind>),
    GetStatic(FieldRef),
    PutStatic(FieldRef),
    GetField(FieldRef),
    PutField(FieldRef),
    Invoke {
        kind: InvokeKind,
        method: MethodSignature,
    },
    New(String),
    NewArray(ValueKind),
    MultiNewArray {
        class: String,
        dimensions: u8,
    },
    ArrayLength,
    Throw,
    CheckCast(String),
    InstanceOf(String),
    MonitorEnter,
    MonitorExit,
}

impl Instruction {
    /// The number of operand stack slots popped and pushed.
    ///
    /// Invocations with an unparseable descriptor report `(receiver, 0)`.
    pub fn stack_effect(&self) -> (u16, u16) {
        use Instruction::*;
        match self {
            Nop | Increment { .. } | Goto(_) | Ret(_) => (0, 0),
            Constant(c) => (0, c.kind().slots()),
            Load { kind, .. } => (0, kind.slots()),
            Store { kind, .. } => (kind.slots(), 0),
            ArrayLoad(kind) => (2, kind.slots()),
            ArrayStore(kind) => (2 + kind.slots(), 0),
            Pop => (1, 0),
            Pop2 => (2, 0),
            Dup => (1, 2),
            DupX1 => (2, 3),
            DupX2 => (3, 4),
            Dup2 => (2, 4),
            Dup2X1 => (3, 5),
            Dup2X2 => (4, 6),
            Swap => (2, 2),
            Arithmetic { op, kind } => {
                if op.is_shift() {
                    (kind.slots() + 1, kind.slots())
                } else {
                    (2 * kind.slots(), kind.slots())
                }
            }
            Negate(kind) => (kind.slots(), kind.slots()),
            Convert { from, to } => (from.slots(), to.slots()),
            Compare(kind) => (2 * kind.slots(), 1),
            IfZero { .. } => (1, 0),
            IfCompare { .. } => (2, 0),
            Jsr(_) => (0, 1),
            TableSwitch { .. } | LookupSwitch { .. } => (1, 0),
            Return(kind) => (kind.map(|k| k.slots()).unwrap_or(0), 0),
            GetStatic(f) => (0, f.kind().slots()),
            PutStatic(f) => (f.kind().slots(), 0),
            GetField(f) => (1, f.kind().slots()),
            PutField(f) => (1 + f.kind().slots(), 0),
            Invoke { kind, method } => {
                let receiver = u16::from(kind.has_receiver());
                match method.descriptor() {
                    Ok(d) => (d.argument_slots() + receiver, d.return_slots()),
                    Err(_) => (receiver, 0),
                }
            }
            New(_) => (0, 1),
            NewArray(_) => (1, 1),
            MultiNewArray { dimensions, .. } => (u16::from(*dimensions), 1),
            ArrayLength | CheckCast(_) | InstanceOf(_) => (1, 1),
            Throw | MonitorEnter | MonitorExit => (1, 0),
        }
    }

    /// Whether control may continue at the next offset.
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            Instruction::Goto(_)
                | Instruction::Jsr(_)
                | Instruction::Ret(_)
                | Instruction::TableSwitch { .. }
                | Instruction::LookupSwitch { .. }
                | Instruction::Return(_)
                | Instruction::Throw
        )
    }

    /// Explicit branch targets, in declaration order (the default target of
    /// a switch comes last).
    pub fn branch_targets(&self) -> Vec<u32> {
        match self {
            Instruction::IfZero { target, .. } | Instruction::IfCompare { target, .. } => {
                vec![*target]
            }
            Instruction::Goto(t) | Instruction::Jsr(t) => vec![*t],
            Instruction::TableSwitch {
                default, targets, ..
            } => targets.iter().copied().chain([*default]).collect(),
            Instruction::LookupSwitch { default, pairs } => {
                pairs.iter().map(|(_, t)| *t).chain([*default]).collect()
            }
            _ => Vec::new(),
        }
    }

    pub(crate) fn targets_mut(&mut self) -> Vec<&mut u32> {
        match self {
            Instruction::IfZero { target, .. } | Instruction::IfCompare { target, .. } => {
                vec![target]
            }
            Instruction::Goto(t) | Instruction::Jsr(t) => vec![t],
            Instruction::TableSwitch {
                default, targets, ..
            } => targets.iter_mut().chain([default]).collect(),
            Instruction::LookupSwitch { default, pairs } => {
                pairs.iter_mut().map(|(_, t)| t).chain([default]).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn is_conditional(&self) -> bool {
        matches!(
            self,
            Instruction::IfZero { .. } | Instruction::IfCompare { .. }
        )
    }

    pub fn is_switch(&self) -> bool {
        matches!(
            self,
            Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. }
        )
    }

    pub fn is_return(&self) -> bool {
        matches!(self, Instruction::Return(_))
    }

    pub fn invoked_method(&self) -> Option<(InvokeKind, MethodSignature)> {
        match self {
            Instruction::Invoke { kind, method } => Some((*kind, *method)),
            _ => None,
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use Instruction::*;
        match self {
            Nop => write!(f, "nop"),
            Constant(c) => write!(f, "ldc {c:?}"),
            Load { kind, index } => write!(f, "{}load {index}", kind.prefix()),
            Store { kind, index } => write!(f, "{}store {index}", kind.prefix()),
            Increment { index, delta } => write!(f, "iinc {index} {delta}"),
            ArrayLoad(kind) => write!(f, "{}aload", kind.prefix()),
            ArrayStore(kind) => write!(f, "{}astore", kind.prefix()),
            Pop => write!(f, "pop"),
            Pop2 => write!(f, "pop2"),
            Dup => write!(f, "dup"),
            DupX1 => write!(f, "dup_x1"),
            DupX2 => write!(f, "dup_x2"),
            Dup2 => write!(f, "dup2"),
            Dup2X1 => write!(f, "dup2_x1"),
            Dup2X2 => write!(f, "dup2_x2"),
            Swap => write!(f, "swap"),
            Arithmetic { op, kind } => {
                write!(f, "{}{}", kind.prefix(), format!("{op:?}").to_lowercase())
            }
            Negate(kind) => write!(f, "{}neg", kind.prefix()),
            Convert { from, to } => write!(f, "{}2{}", from.prefix(), to.prefix()),
            Compare(kind) => write!(f, "{}cmp", kind.prefix()),
            IfZero { condition, target } => write!(f, "if{condition:?} -> {target}"),
            IfCompare {
                condition,
                kind,
                target,
            } => write!(f, "if_{}cmp{condition:?} -> {target}", kind.prefix()),
            Goto(t) => write!(f, "goto {t}"),
            Jsr(t) => write!(f, "jsr {t}"),
            Ret(i) => write!(f, "ret {i}"),
            TableSwitch { default, low, targets } => {
                write!(f, "tableswitch low={low} {targets:?} default={default}")
            }
            LookupSwitch { default, pairs } => {
                write!(f, "lookupswitch {pairs:?} default={default}")
            }
            Return(Some(kind)) => write!(f, "{}return", kind.prefix()),
            Return(None) => write!(f, "return"),
            GetStatic(field) => write!(f, "getstatic {field}"),
            PutStatic(field) => write!(f, "putstatic {field}"),
            GetField(field) => write!(f, "getfield {field}"),
            PutField(field) => write!(f, "putfield {field}"),
            Invoke { kind, method } => {
                write!(f, "invoke{} {method}", format!("{kind:?}").to_lowercase())
            }
            New(class) => write!(f, "new {class}"),
            NewArray(kind) => write!(f, "newarray {kind:?}"),
            MultiNewArray { class, dimensions } => write!(f, "multianewarray {class} {dimensions}"),
            ArrayLength => write!(f, "arraylength"),
            Throw => write!(f, "athrow"),
            CheckCast(class) => write!(f, "checkcast {class}"),
            InstanceOf(class) => write!(f, "instanceof {class}"),
            MonitorEnter => write!(f, "monitorenter"),
            MonitorExit => write!(f, "monitorexit"),
        }
    }
}
