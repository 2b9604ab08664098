//! Small assembler for building classes by hand, mostly used for tests and demos.
//!
//! ```
//! use jcpa_bytecode::builder::ClassBuilder;
//!
//! let class = ClassBuilder::new("A")
//!     .static_method("main", "()V", |code| {
//!         code.invokestatic("A", "source", "()Ljava/lang/String;")
//!             .astore(0)
//!             .aload(0)
//!             .invokestatic("A", "sink", "(Ljava/lang/String;)V")
//!             .return_void();
//!     })
//!     .build()
//!     .unwrap();
//! assert_eq!(class.methods[0].max_locals, 1);
//! ```

use crate::class::{Class, Method};
use crate::error::BytecodeError;
use crate::instruction::{ArithmeticOp, Condition, Constant, Instruction, InvokeKind, ValueKind};
use crate::signature::{FieldRef, MethodSignature};

/// A forward-referenceable code position.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Label(usize);

#[derive(Debug, Default)]
pub struct CodeBuilder {
    code: Vec<Instruction>,
    labels: Vec<Option<u32>>,
    fixups: Vec<usize>,
    error: Option<BytecodeError>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Binds `label` to the offset of the next emitted instruction.
    pub fn bind(&mut self, label: Label) -> &mut Self {
        let offset = self.code.len() as u32;
        match self.labels.get_mut(label.0) {
            Some(slot) if slot.is_none() => *slot = Some(offset),
            _ => self.fail(BytecodeError::ReboundLabel(label.0)),
        }
        self
    }

    pub fn offset(&self) -> u32 {
        self.code.len() as u32
    }

    /// Emits an instruction verbatim. Branch targets are taken as absolute offsets.
    pub fn instruction(&mut self, instruction: Instruction) -> &mut Self {
        self.code.push(instruction);
        self
    }

    fn branch(&mut self, instruction: Instruction) -> &mut Self {
        self.fixups.push(self.code.len());
        self.code.push(instruction);
        self
    }

    fn fail(&mut self, error: BytecodeError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    pub fn nop(&mut self) -> &mut Self {
        self.instruction(Instruction::Nop)
    }

    pub fn iconst(&mut self, value: i32) -> &mut Self {
        self.instruction(Instruction::Constant(Constant::Int(value)))
    }

    pub fn lconst(&mut self, value: i64) -> &mut Self {
        self.instruction(Instruction::Constant(Constant::Long(value)))
    }

    pub fn ldc_string(&mut self, value: &str) -> &mut Self {
        self.instruction(Instruction::Constant(Constant::String(value.to_string())))
    }

    pub fn aconst_null(&mut self) -> &mut Self {
        self.instruction(Instruction::Constant(Constant::Null))
    }

    pub fn load(&mut self, kind: ValueKind, index: u16) -> &mut Self {
        self.instruction(Instruction::Load { kind, index })
    }

    pub fn store(&mut self, kind: ValueKind, index: u16) -> &mut Self {
        self.instruction(Instruction::Store { kind, index })
    }

    pub fn iload(&mut self, index: u16) -> &mut Self {
        self.load(ValueKind::Int, index)
    }

    pub fn lload(&mut self, index: u16) -> &mut Self {
        self.load(ValueKind::Long, index)
    }

    pub fn aload(&mut self, index: u16) -> &mut Self {
        self.load(ValueKind::Reference, index)
    }

    pub fn istore(&mut self, index: u16) -> &mut Self {
        self.store(ValueKind::Int, index)
    }

    pub fn lstore(&mut self, index: u16) -> &mut Self {
        self.store(ValueKind::Long, index)
    }

    pub fn astore(&mut self, index: u16) -> &mut Self {
        self.store(ValueKind::Reference, index)
    }

    pub fn iinc(&mut self, index: u16, delta: i32) -> &mut Self {
        self.instruction(Instruction::Increment { index, delta })
    }

    pub fn pop(&mut self) -> &mut Self {
        self.instruction(Instruction::Pop)
    }

    pub fn pop2(&mut self) -> &mut Self {
        self.instruction(Instruction::Pop2)
    }

    pub fn dup(&mut self) -> &mut Self {
        self.instruction(Instruction::Dup)
    }

    pub fn dup2(&mut self) -> &mut Self {
        self.instruction(Instruction::Dup2)
    }

    pub fn swap(&mut self) -> &mut Self {
        self.instruction(Instruction::Swap)
    }

    pub fn arithmetic(&mut self, op: ArithmeticOp, kind: ValueKind) -> &mut Self {
        self.instruction(Instruction::Arithmetic { op, kind })
    }

    pub fn iadd(&mut self) -> &mut Self {
        self.arithmetic(ArithmeticOp::Add, ValueKind::Int)
    }

    pub fn ladd(&mut self) -> &mut Self {
        self.arithmetic(ArithmeticOp::Add, ValueKind::Long)
    }

    pub fn getstatic(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        self.instruction(Instruction::GetStatic(FieldRef::new(class, name, descriptor)))
    }

    pub fn putstatic(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        self.instruction(Instruction::PutStatic(FieldRef::new(class, name, descriptor)))
    }

    pub fn getfield(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        self.instruction(Instruction::GetField(FieldRef::new(class, name, descriptor)))
    }

    pub fn putfield(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        self.instruction(Instruction::PutField(FieldRef::new(class, name, descriptor)))
    }

    pub fn invoke(
        &mut self,
        kind: InvokeKind,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> &mut Self {
        let method = MethodSignature::new(class, name, descriptor);
        if let Err(e) = method.descriptor() {
            self.fail(e);
        }
        self.instruction(Instruction::Invoke { kind, method })
    }

    pub fn invokestatic(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        self.invoke(InvokeKind::Static, class, name, descriptor)
    }

    pub fn invokevirtual(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        self.invoke(InvokeKind::Virtual, class, name, descriptor)
    }

    pub fn invokespecial(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        self.invoke(InvokeKind::Special, class, name, descriptor)
    }

    pub fn new_object(&mut self, class: &str) -> &mut Self {
        self.instruction(Instruction::New(class.to_string()))
    }

    pub fn newarray(&mut self, kind: ValueKind) -> &mut Self {
        self.instruction(Instruction::NewArray(kind))
    }

    pub fn array_load(&mut self, kind: ValueKind) -> &mut Self {
        self.instruction(Instruction::ArrayLoad(kind))
    }

    pub fn array_store(&mut self, kind: ValueKind) -> &mut Self {
        self.instruction(Instruction::ArrayStore(kind))
    }

    pub fn goto(&mut self, label: Label) -> &mut Self {
        self.branch(Instruction::Goto(label.0 as u32))
    }

    pub fn jsr(&mut self, label: Label) -> &mut Self {
        self.branch(Instruction::Jsr(label.0 as u32))
    }

    pub fn ret(&mut self, index: u16) -> &mut Self {
        self.instruction(Instruction::Ret(index))
    }

    pub fn if_zero(&mut self, condition: Condition, label: Label) -> &mut Self {
        self.branch(Instruction::IfZero {
            condition,
            target: label.0 as u32,
        })
    }

    pub fn ifeq(&mut self, label: Label) -> &mut Self {
        self.if_zero(Condition::Eq, label)
    }

    pub fn ifne(&mut self, label: Label) -> &mut Self {
        self.if_zero(Condition::Ne, label)
    }

    pub fn if_icmp(&mut self, condition: Condition, label: Label) -> &mut Self {
        self.branch(Instruction::IfCompare {
            condition,
            kind: ValueKind::Int,
            target: label.0 as u32,
        })
    }

    pub fn table_switch(&mut self, low: i32, targets: &[Label], default: Label) -> &mut Self {
        self.branch(Instruction::TableSwitch {
            default: default.0 as u32,
            low,
            targets: targets.iter().map(|l| l.0 as u32).collect(),
        })
    }

    pub fn lookup_switch(&mut self, pairs: &[(i32, Label)], default: Label) -> &mut Self {
        self.branch(Instruction::LookupSwitch {
            default: default.0 as u32,
            pairs: pairs.iter().map(|(k, l)| (*k, l.0 as u32)).collect(),
        })
    }

    pub fn ireturn(&mut self) -> &mut Self {
        self.instruction(Instruction::Return(Some(ValueKind::Int)))
    }

    pub fn lreturn(&mut self) -> &mut Self {
        self.instruction(Instruction::Return(Some(ValueKind::Long)))
    }

    pub fn areturn(&mut self) -> &mut Self {
        self.instruction(Instruction::Return(Some(ValueKind::Reference)))
    }

    pub fn return_void(&mut self) -> &mut Self {
        self.instruction(Instruction::Return(None))
    }

    pub fn athrow(&mut self) -> &mut Self {
        self.instruction(Instruction::Throw)
    }

    /// Resolves labels and returns the finished code.
    pub fn build(mut self) -> Result<Vec<Instruction>, BytecodeError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let length = self.code.len();
        for idx in self.fixups {
            for target in self.code[idx].targets_mut() {
                let offset = self
                    .labels
                    .get(*target as usize)
                    .copied()
                    .flatten()
                    .ok_or(BytecodeError::UnboundLabel(*target as usize))?;
                if offset as usize >= length {
                    return Err(BytecodeError::TargetOutOfRange {
                        target: offset,
                        length,
                    });
                }
                *target = offset;
            }
        }
        Ok(self.code)
    }
}

/// Computes the number of local variable slots touched by `code`, at least
/// `parameter_slots`.
pub fn compute_max_locals(code: &[Instruction], parameter_slots: u16) -> u16 {
    code.iter()
        .filter_map(|i| match i {
            Instruction::Load { kind, index } | Instruction::Store { kind, index } => {
                Some(index + kind.slots())
            }
            Instruction::Increment { index, .. } | Instruction::Ret(index) => Some(index + 1),
            _ => None,
        })
        .fold(parameter_slots, u16::max)
}

pub struct ClassBuilder {
    class: Class,
    error: Option<BytecodeError>,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            class: Class::new(name),
            error: None,
        }
    }

    pub fn extends(mut self, super_class: &str) -> Self {
        self.class.super_class = Some(super_class.to_string());
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.class.interfaces.push(interface.to_string());
        self
    }

    pub fn static_method<F: FnOnce(&mut CodeBuilder)>(
        self,
        name: &str,
        descriptor: &str,
        body: F,
    ) -> Self {
        self.method(name, descriptor, true, body)
    }

    pub fn instance_method<F: FnOnce(&mut CodeBuilder)>(
        self,
        name: &str,
        descriptor: &str,
        body: F,
    ) -> Self {
        self.method(name, descriptor, false, body)
    }

    fn method<F: FnOnce(&mut CodeBuilder)>(
        mut self,
        name: &str,
        descriptor: &str,
        is_static: bool,
        body: F,
    ) -> Self {
        let mut code = CodeBuilder::new();
        body(&mut code);
        let result = code.build().and_then(|code| {
            let mut method = Method {
                name: name.to_string(),
                descriptor: descriptor.to_string(),
                is_static,
                max_locals: 0,
                code: None,
            };
            method.max_locals = compute_max_locals(&code, method.parameter_slots()?);
            method.code = Some(code);
            self.class.add_method(method)
        });
        self.record(result);
        self
    }

    /// Declares a method without a body, such as a library or native method.
    pub fn bodiless_method(mut self, name: &str, descriptor: &str, is_static: bool) -> Self {
        let mut method = Method {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            is_static,
            max_locals: 0,
            code: None,
        };
        let result = method.parameter_slots().and_then(|slots| {
            method.max_locals = slots;
            self.class.add_method(method)
        });
        self.record(result);
        self
    }

    fn record(&mut self, result: Result<(), BytecodeError>) {
        if let Err(e) = result {
            self.error.get_or_insert(e);
        }
    }

    pub fn build(self) -> Result<Class, BytecodeError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.class),
        }
    }
}
