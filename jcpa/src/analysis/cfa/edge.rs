use crate::analysis::cfa::ProgramLocation;
use jcpa_bytecode::{Instruction, InvokeKind, MethodSignature, ValueKind};

/// A method invocation from a call site to one of its possible targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Call {
    pub caller: ProgramLocation,
    pub target: MethodSignature,
    pub invoke_kind: InvokeKind,
    pub parameters: Vec<ValueKind>,
    pub return_kind: Option<ValueKind>,
}

impl Call {
    /// A call whose target has a malformed descriptor is treated as taking no arguments and
    /// returning nothing.
    pub fn new(caller: ProgramLocation, invoke_kind: InvokeKind, target: MethodSignature) -> Self {
        let (parameters, return_kind) = match target.descriptor() {
            Ok(d) => (d.parameters, d.return_kind),
            Err(_) => (Vec::new(), None),
        };
        Self {
            caller,
            target,
            invoke_kind,
            parameters,
            return_kind,
        }
    }

    pub fn is_static(&self) -> bool {
        !self.invoke_kind.has_receiver()
    }

    pub fn argument_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn argument_slots(&self) -> u16 {
        self.parameters.iter().map(|k| k.slots()).sum()
    }

    pub fn return_slots(&self) -> u16 {
        self.return_kind.map(|k| k.slots()).unwrap_or(0)
    }

    /// Operand stack slots consumed by the call, receiver included.
    pub fn popped_slots(&self) -> u16 {
        self.argument_slots() + u16::from(!self.is_static())
    }

    /// Where the caller continues after the call returns.
    pub fn return_point(&self) -> Option<ProgramLocation> {
        self.caller.next()
    }

    /// Operand stack depth, counted from the top at the call site, of the value slot of the
    /// argument at `index` (0-based, receiver excluded).
    pub fn argument_depth(&self, index: usize) -> Option<u16> {
        let kind = self.parameters.get(index)?;
        let above: u16 = self.parameters[index + 1..].iter().map(|k| k.slots()).sum();
        Some(above + kind.slots() - 1)
    }

    /// Operand stack depth of the receiver at the call site.
    pub fn receiver_depth(&self) -> Option<u16> {
        (!self.is_static()).then(|| self.argument_slots())
    }

    /// The local variable the argument at `index` occupies in the callee's entry frame.
    pub fn argument_local(&self, index: usize) -> Option<u16> {
        self.parameters.get(index)?;
        let before: u16 = self.parameters[..index].iter().map(|k| k.slots()).sum();
        Some(before + u16::from(!self.is_static()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CfaEdgeKind {
    /// Executes the instruction and continues at the edge target.
    Instruction,
    /// Enters the callee; the edge target is the callee's entry.
    Call(Call),
    AssumeTaken,
    AssumeNotTaken,
    AssumeCase(i32),
    AssumeDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfaEdge {
    pub kind: CfaEdgeKind,
    /// The instruction at the edge source.
    pub instruction: Instruction,
}

impl CfaEdge {
    pub fn new(kind: CfaEdgeKind, instruction: Instruction) -> Self {
        Self { kind, instruction }
    }

    pub fn call(&self) -> Option<&Call> {
        match &self.kind {
            CfaEdgeKind::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn is_call(&self) -> bool {
        self.call().is_some()
    }
}

/// An edge together with its endpoints, as handed out by [`JvmCfa`](super::JvmCfa).
#[derive(Debug, Copy, Clone)]
pub struct CfaEdgeRef<'a> {
    pub source: ProgramLocation,
    pub target: ProgramLocation,
    pub edge: &'a CfaEdge,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_layout() {
        let target = MethodSignature::new("A", "f", "(IJLjava/lang/Object;)V");
        let caller = ProgramLocation::code(MethodSignature::new("A", "main", "()V"), 3);
        let call = Call::new(caller, InvokeKind::Virtual, target);
        assert_eq!(call.argument_count(), 3);
        assert_eq!(call.popped_slots(), 5);
        assert_eq!(call.argument_depth(2), Some(0));
        assert_eq!(call.argument_depth(1), Some(2));
        assert_eq!(call.argument_depth(0), Some(3));
        assert_eq!(call.receiver_depth(), Some(4));
        assert_eq!(call.argument_local(0), Some(1));
        assert_eq!(call.argument_local(2), Some(4));
        assert_eq!(call.return_point(), Some(ProgramLocation::code(caller.signature().unwrap(), 4)));
    }
}
