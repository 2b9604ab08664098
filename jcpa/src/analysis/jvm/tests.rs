use crate::analysis::cfa::{CfaMethod, JvmCfa, ProgramLocation};
use crate::analysis::cpa::lattice::JoinSemiLattice;
use crate::analysis::cpa::lattice::flat::FlatLattice;
use crate::analysis::cpa::lattice::map::MapAbstractState;
use crate::analysis::cpa::state::LocationState;
use crate::analysis::jvm::JvmAbstractValue;
use crate::analysis::jvm::frame::JvmFrameAbstractState;
use crate::analysis::jvm::heap::{
    FieldKey, HeapFactories, HeapModel, JvmHeap, JvmHeapAbstractState,
};
use crate::analysis::jvm::reference::{Reference, ReferenceSlot};
use crate::analysis::jvm::state::JvmAbstractState;
use crate::analysis::jvm::transfer::JvmTransferRelation;
use crate::analysis::value::{ConstantSemantics, ValueAbstractState, ValueAbstractValue};
use jcpa_bytecode::{
    Constant, FieldRef, Instruction, InvokeKind, MethodDescriptor, MethodSignature, ValueKind,
};

fn method() -> MethodSignature {
    MethodSignature::new("A", "m", "()V")
}

fn at(offset: u32) -> ProgramLocation {
    ProgramLocation::code(method(), offset)
}

fn state(model: HeapModel) -> ValueAbstractState {
    JvmAbstractState::new(
        at(0),
        JvmFrameAbstractState::new(),
        JvmHeapAbstractState::new(model, &HeapFactories::default()),
        MapAbstractState::new(),
    )
}

fn int(i: i32) -> Instruction {
    Instruction::Constant(Constant::Int(i))
}

/// Runs `code` as if instruction `i` sat at offset `i`.
fn run(state: &mut ValueAbstractState, code: &[Instruction]) {
    let cfa = JvmCfa::new();
    let transfer = JvmTransferRelation::new(&cfa, &ConstantSemantics);
    for (offset, instruction) in code.iter().enumerate() {
        transfer.execute(state, instruction, at(offset as u32));
    }
}

fn stack(state: &ValueAbstractState) -> Vec<Option<i32>> {
    state
        .frame
        .operand_stack
        .iter()
        .map(ValueAbstractValue::as_int)
        .collect()
}

#[test]
fn stack_shuffles() {
    let mut s = state(HeapModel::Forgetful);
    run(&mut s, &[int(1), int(2), Instruction::DupX1]);
    assert_eq!(stack(&s), vec![Some(2), Some(1), Some(2)]);
    run(&mut s, &[Instruction::Swap]);
    assert_eq!(stack(&s), vec![Some(2), Some(2), Some(1)]);
    run(&mut s, &[Instruction::Dup2, Instruction::Pop2, Instruction::Pop]);
    assert_eq!(stack(&s), vec![Some(2), Some(2)]);
}

#[test]
fn return_keeps_only_the_returned_value() {
    let mut s = state(HeapModel::Forgetful);
    run(
        &mut s,
        &[int(1), int(2), int(3), Instruction::Return(Some(ValueKind::Int))],
    );
    assert_eq!(stack(&s), vec![Some(3)]);
    run(&mut s, &[Instruction::Throw]);
    assert!(s.frame.operand_stack.is_empty());
}

#[test]
fn opaque_calls_return_fresh_references() {
    let mut s = state(HeapModel::Forgetful);
    let callee = MethodSignature::new("B", "f", "(ILjava/lang/String;)Ljava/lang/Object;");
    run(
        &mut s,
        &[
            int(1),
            Instruction::Constant(Constant::String("x".to_string())),
            Instruction::Invoke {
                kind: InvokeKind::Static,
                method: callee,
            },
        ],
    );
    assert_eq!(s.frame.operand_stack.len(), 1);
    let result = s.frame.peek(0);
    assert!(result.constant.is_top());
    let expected = Reference::new(at(2), ReferenceSlot::Stack(0));
    assert!(result.references().contains(&expected));
}

#[test]
fn unseen_static_references_point_to_the_field() {
    let mut s = state(HeapModel::Forgetful);
    let field = FieldRef::new("A", "out", "Ljava/io/PrintStream;");
    run(&mut s, &[Instruction::GetStatic(field.clone())]);
    let value = s.frame.peek(0);
    assert!(
        value
            .references()
            .contains(&Reference::static_field(at(0), "A.out"))
    );
    run(&mut s, &[int(5), Instruction::PutStatic(FieldRef::new("A", "n", "I"))]);
    assert_eq!(s.static_field("A.n").and_then(|v| v.as_int()), Some(5));
}

#[test]
fn array_writes_are_weak() {
    let mut s = state(HeapModel::Tree);
    run(
        &mut s,
        &[
            int(3),
            Instruction::NewArray(ValueKind::Int),
            Instruction::Dup,
            int(0),
            int(5),
            Instruction::ArrayStore(ValueKind::Int),
            Instruction::Dup,
            int(1),
            Instruction::ArrayLoad(ValueKind::Int),
        ],
    );
    assert_eq!(s.frame.peek(0).as_int(), Some(5));
    run(
        &mut s,
        &[
            Instruction::Pop,
            Instruction::Dup,
            int(1),
            int(6),
            Instruction::ArrayStore(ValueKind::Int),
            int(0),
            Instruction::ArrayLoad(ValueKind::Int),
        ],
    );
    assert!(s.frame.peek(0).constant.is_top());
    assert!(s.frame.operand_stack.len() == 1);
}

#[test]
fn field_writes_to_one_object_are_strong() {
    let mut s = state(HeapModel::Tree);
    let x = FieldRef::new("A", "x", "I");
    run(
        &mut s,
        &[
            Instruction::New("A".to_string()),
            Instruction::Dup,
            int(1),
            Instruction::PutField(x.clone()),
            Instruction::Dup,
            int(2),
            Instruction::PutField(x.clone()),
            Instruction::GetField(x.clone()),
        ],
    );
    assert_eq!(s.frame.peek(0).as_int(), Some(2));
}

#[test]
fn entry_state_gives_each_reference_parameter_its_own_object() {
    let descriptor = MethodDescriptor::parse("(JLjava/lang/String;)V").unwrap();
    let signature = MethodSignature::new("A", "m", "(JLjava/lang/String;)V");
    let method = CfaMethod {
        signature,
        descriptor,
        is_static: false,
        max_locals: 4,
    };
    let s: ValueAbstractState = JvmAbstractState::entry(
        &method,
        &ConstantSemantics,
        JvmHeapAbstractState::new(HeapModel::Forgetful, &HeapFactories::default()),
        MapAbstractState::new(),
    );
    let entry = ProgramLocation::entry(signature);
    assert_eq!(s.location(), &entry);
    assert!(
        s.frame
            .load(0)
            .references()
            .contains(&Reference::new(entry, ReferenceSlot::Local(0)))
    );
    assert!(s.frame.load(1).constant.is_top());
    assert!(s.frame.load(2).is_padding());
    assert!(
        s.frame
            .load(3)
            .references()
            .contains(&Reference::new(entry, ReferenceSlot::Local(3)))
    );
}

#[test]
fn unknown_object_used_as_array_and_as_object_joins_to_top_kind() {
    let unknown = MethodSignature::new("B", "f", "()Ljava/lang/Object;");
    let x = FieldRef::new("A", "x", "I");
    let call = Instruction::Invoke {
        kind: InvokeKind::Static,
        method: unknown,
    };
    let mut as_array = state(HeapModel::Tree);
    run(
        &mut as_array,
        &[
            call.clone(),
            Instruction::Dup,
            int(0),
            int(7),
            Instruction::ArrayStore(ValueKind::Int),
        ],
    );
    let mut as_object = state(HeapModel::Tree);
    run(
        &mut as_object,
        &[call, Instruction::Dup, int(3), Instruction::PutField(x.clone())],
    );

    let object = as_array.frame.peek(0);
    let reference = Reference::new(at(0), ReferenceSlot::Stack(0));
    assert!(object.references().contains(&reference));

    let mut joined = as_array.heap.clone();
    joined.join(&as_object.heap);
    assert!(as_array.heap.is_less_or_equal(&joined));
    assert!(as_object.heap.is_less_or_equal(&joined));
    let JvmHeapAbstractState::Tree(tree) = &joined else {
        panic!("expected a tree heap");
    };
    let node = tree.node(&reference).expect("node survives the join");
    assert_eq!(node.kind, FlatLattice::Top);
    assert_eq!(
        joined.value_at(&reference, &FieldKey::field("x")).and_then(|v| v.as_int()),
        Some(3)
    );
    assert_eq!(
        joined.get_array(&object, ValueKind::Int).and_then(|v| v.as_int()),
        Some(7)
    );
}
