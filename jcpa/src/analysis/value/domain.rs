use crate::analysis::cpa::lattice::flat::FlatLattice;
use crate::analysis::cpa::lattice::set::SetAbstractState;
use crate::analysis::cpa::lattice::{BoundedJoinSemiLattice, JoinSemiLattice, product_cmp};
use crate::analysis::jvm::reference::Reference;
use crate::analysis::jvm::{JvmAbstractValue, ValueSemantics};
use jcpa_bytecode::{ArithmeticOp, Constant, Instruction, ValueKind};
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};

/// A constant, if the value is known to be one, and the objects it may point to.
#[derive(Clone, PartialEq, Eq)]
pub struct ValueAbstractValue {
    pub constant: FlatLattice<Constant>,
    pub references: SetAbstractState<Reference>,
    padding: bool,
}

impl ValueAbstractValue {
    pub fn constant(constant: Constant) -> Self {
        Self {
            constant: FlatLattice::Value(constant),
            references: SetAbstractState::new(),
            padding: false,
        }
    }

    pub fn top() -> Self {
        Self {
            constant: FlatLattice::Top,
            references: SetAbstractState::new(),
            padding: false,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self.constant.value()? {
            Constant::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self.constant.value()? {
            Constant::Long(l) => Some(*l),
            _ => None,
        }
    }
}

impl Debug for ValueAbstractValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.padding {
            return write!(f, "pad");
        }
        match &self.constant {
            FlatLattice::Value(c) => write!(f, "{c:?}")?,
            other => write!(f, "{other:?}")?,
        }
        if !self.references.is_empty() {
            write!(f, " -> {:?}", self.references)?;
        }
        Ok(())
    }
}

fn padding_cmp(a: bool, b: bool) -> Ordering {
    // padding lies below every real value
    b.cmp(&a)
}

impl PartialOrd for ValueAbstractValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        product_cmp(
            product_cmp(
                self.constant.partial_cmp(&other.constant),
                self.references.partial_cmp(&other.references),
            ),
            Some(padding_cmp(self.padding, other.padding)),
        )
    }
}

impl JoinSemiLattice for ValueAbstractValue {
    fn join(&mut self, other: &Self) {
        self.constant.join(&other.constant);
        self.references.join(&other.references);
        self.padding &= other.padding;
    }
}

impl BoundedJoinSemiLattice for ValueAbstractValue {
    fn bottom() -> Self {
        Self::padding()
    }

    fn is_bottom(&self) -> bool {
        self.padding && self.constant.is_bottom() && self.references.is_empty()
    }
}

impl JvmAbstractValue for ValueAbstractValue {
    fn unknown() -> Self {
        Self::top()
    }

    fn padding() -> Self {
        Self {
            constant: FlatLattice::Bottom,
            references: SetAbstractState::new(),
            padding: true,
        }
    }

    fn is_padding(&self) -> bool {
        self.padding
    }

    fn references(&self) -> &SetAbstractState<Reference> {
        &self.references
    }

    fn with_references(mut self, references: SetAbstractState<Reference>) -> Self {
        self.references = references;
        self
    }
}

/// Folds integer and long arithmetic on constants. Anything else is unknown.
#[derive(Debug, Default, Copy, Clone)]
pub struct ConstantSemantics;

fn fold_int(op: ArithmeticOp, a: i32, b: i32) -> Option<i32> {
    Some(match op {
        ArithmeticOp::Add => a.wrapping_add(b),
        ArithmeticOp::Sub => a.wrapping_sub(b),
        ArithmeticOp::Mul => a.wrapping_mul(b),
        ArithmeticOp::Div => a.checked_div(b).or_else(|| (b == -1).then(|| a.wrapping_neg()))?,
        ArithmeticOp::Rem => a.checked_rem(b).or_else(|| (b == -1).then_some(0))?,
        ArithmeticOp::Shl => a.wrapping_shl(b as u32),
        ArithmeticOp::Shr => a.wrapping_shr(b as u32),
        ArithmeticOp::UShr => (a as u32).wrapping_shr(b as u32) as i32,
        ArithmeticOp::And => a & b,
        ArithmeticOp::Or => a | b,
        ArithmeticOp::Xor => a ^ b,
    })
}

fn fold_long(op: ArithmeticOp, a: i64, b: i64) -> Option<i64> {
    Some(match op {
        ArithmeticOp::Add => a.wrapping_add(b),
        ArithmeticOp::Sub => a.wrapping_sub(b),
        ArithmeticOp::Mul => a.wrapping_mul(b),
        ArithmeticOp::Div => a.checked_div(b).or_else(|| (b == -1).then(|| a.wrapping_neg()))?,
        ArithmeticOp::Rem => a.checked_rem(b).or_else(|| (b == -1).then_some(0))?,
        ArithmeticOp::Shl => a.wrapping_shl(b as u32),
        ArithmeticOp::Shr => a.wrapping_shr(b as u32),
        ArithmeticOp::UShr => (a as u64).wrapping_shr(b as u32) as i64,
        ArithmeticOp::And => a & b,
        ArithmeticOp::Or => a | b,
        ArithmeticOp::Xor => a ^ b,
    })
}

impl ConstantSemantics {
    fn known(constant: Option<Constant>) -> ValueAbstractValue {
        constant
            .map(ValueAbstractValue::constant)
            .unwrap_or_else(ValueAbstractValue::top)
    }
}

impl ValueSemantics<ValueAbstractValue> for ConstantSemantics {
    fn constant(&self, constant: &Constant) -> ValueAbstractValue {
        ValueAbstractValue::constant(constant.clone())
    }

    fn arithmetic(
        &self,
        op: ArithmeticOp,
        kind: ValueKind,
        left: &ValueAbstractValue,
        right: &ValueAbstractValue,
    ) -> ValueAbstractValue {
        let folded = match (kind, left.constant.value(), right.constant.value()) {
            (ValueKind::Int, Some(Constant::Int(a)), Some(Constant::Int(b))) => {
                fold_int(op, *a, *b).map(Constant::Int)
            }
            (ValueKind::Long, Some(Constant::Long(a)), Some(Constant::Long(b))) => {
                fold_long(op, *a, *b).map(Constant::Long)
            }
            (ValueKind::Long, Some(Constant::Long(a)), Some(Constant::Int(b))) if op.is_shift() => {
                fold_long(op, *a, i64::from(*b)).map(Constant::Long)
            }
            _ => None,
        };
        Self::known(folded)
    }

    fn unary(&self, instruction: &Instruction, operand: &ValueAbstractValue) -> ValueAbstractValue {
        let folded = match (instruction, operand.constant.value()) {
            (Instruction::Negate(_), Some(Constant::Int(i))) => Some(Constant::Int(i.wrapping_neg())),
            (Instruction::Negate(_), Some(Constant::Long(l))) => {
                Some(Constant::Long(l.wrapping_neg()))
            }
            (Instruction::Convert { to: ValueKind::Long, .. }, Some(Constant::Int(i))) => {
                Some(Constant::Long(i64::from(*i)))
            }
            (Instruction::Convert { to: ValueKind::Int, .. }, Some(Constant::Long(l))) => {
                Some(Constant::Int(*l as i32))
            }
            (Instruction::InstanceOf(_), Some(Constant::Null)) => Some(Constant::Int(0)),
            _ => None,
        };
        Self::known(folded)
    }

    fn compare(
        &self,
        _kind: ValueKind,
        left: &ValueAbstractValue,
        right: &ValueAbstractValue,
    ) -> ValueAbstractValue {
        match (left.as_long(), right.as_long()) {
            (Some(a), Some(b)) => ValueAbstractValue::constant(Constant::Int(a.cmp(&b) as i32)),
            _ => ValueAbstractValue::top(),
        }
    }

    fn increment(&self, value: &ValueAbstractValue, delta: i32) -> ValueAbstractValue {
        Self::known(value.as_int().map(|i| Constant::Int(i.wrapping_add(delta))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_is_below_real_values() {
        let pad = ValueAbstractValue::padding();
        let one = ValueAbstractValue::constant(Constant::Int(1));
        assert!(pad.is_less_or_equal(&one));
        assert!(!one.is_less_or_equal(&pad));
        let mut joined = pad.clone();
        joined.join(&one);
        assert_eq!(joined, one);
    }

    #[test]
    fn folds_integer_arithmetic() {
        let s = ConstantSemantics;
        let six = ValueAbstractValue::constant(Constant::Int(6));
        let zero = ValueAbstractValue::constant(Constant::Int(0));
        let three = ValueAbstractValue::constant(Constant::Int(3));
        assert_eq!(s.arithmetic(ArithmeticOp::Div, ValueKind::Int, &six, &three).as_int(), Some(2));
        assert!(s.arithmetic(ArithmeticOp::Div, ValueKind::Int, &six, &zero).constant.is_top());
        assert_eq!(s.increment(&six, -1).as_int(), Some(5));
        let min = ValueAbstractValue::constant(Constant::Int(i32::MIN));
        let minus_one = ValueAbstractValue::constant(Constant::Int(-1));
        assert_eq!(
            s.arithmetic(ArithmeticOp::Div, ValueKind::Int, &min, &minus_one).as_int(),
            Some(i32::MIN)
        );
        let long = ValueAbstractValue::constant(Constant::Long(1));
        assert_eq!(
            s.arithmetic(ArithmeticOp::Shl, ValueKind::Long, &long, &three).as_long(),
            Some(8)
        );
        assert_eq!(s.compare(ValueKind::Long, &long, &long).as_int(), Some(0));
    }
}
