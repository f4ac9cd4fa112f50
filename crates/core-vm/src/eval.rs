//! Expression evaluation over AST nodes.
//!
//! Coercion follows the operator, not the operand: arithmetic coerces both
//! sides to numbers (non-numeric strings collapse to 0), `&` always
//! concatenates text, comparisons go numeric only when both sides parse, and
//! the logical operators reduce to 1/0 through truthiness.

use core_lang::{Node, NodeKind, Op};
use core_value::{compare_values, Value};
use std::cmp::Ordering;

use crate::error::VmError;
use crate::vm::Vm;

pub fn eval(vm: &Vm, node: &Node) -> Result<Value, VmError> {
    match &node.kind {
        NodeKind::Literal(text) => Ok(Value::Str(text.clone())),
        NodeKind::Variable(_) | NodeKind::ArrayAccess { .. } => vm.eval_var_node(node),
        NodeKind::SysConst(name) => Ok(vm.sysconst(name)),
        NodeKind::Label(text) => Ok(Value::Str(text.clone())),
        NodeKind::Expression { op, args } => apply(vm, *op, args),
        other => Err(VmError::bad(
            "expression",
            format!("cannot evaluate {other:?}"),
        )),
    }
}

fn apply(vm: &Vm, op: Op, args: &[Node]) -> Result<Value, VmError> {
    if args.len() == 1 {
        let operand = eval(vm, &args[0])?;
        return match op {
            Op::Neg | Op::Sub => Ok(Value::Num(-operand.number_lossy())),
            Op::Pos | Op::Add => Ok(Value::Num(operand.number_lossy())),
            Op::Not => Ok(Value::from(!operand.truthy())),
            _ => Err(VmError::bad(
                "expression",
                format!("operator {} needs two operands", op.symbol()),
            )),
        };
    }

    let left = eval(vm, &args[0])?;
    let right = eval(vm, &args[1])?;
    match op {
        Op::Add => Ok(Value::Num(left.number_lossy() + right.number_lossy())),
        Op::Sub => Ok(Value::Num(left.number_lossy() - right.number_lossy())),
        Op::Mul => Ok(Value::Num(left.number_lossy() * right.number_lossy())),
        Op::Div => {
            let divisor = right.number_lossy();
            if divisor == 0.0 {
                return Err(VmError::DivisionByZero);
            }
            Ok(Value::Num(left.number_lossy() / divisor))
        }
        Op::Concat => Ok(Value::Str(format!("{}{}", left.to_text(), right.to_text()))),
        Op::Eq => Ok(cmp(&left, &right, |o| o == Ordering::Equal)),
        Op::Ne => Ok(cmp(&left, &right, |o| o != Ordering::Equal)),
        Op::Lt => Ok(cmp(&left, &right, |o| o == Ordering::Less)),
        Op::Le => Ok(cmp(&left, &right, |o| o != Ordering::Greater)),
        Op::Gt => Ok(cmp(&left, &right, |o| o == Ordering::Greater)),
        Op::Ge => Ok(cmp(&left, &right, |o| o != Ordering::Less)),
        Op::And => Ok(Value::from(left.truthy() && right.truthy())),
        Op::Or => Ok(Value::from(left.truthy() || right.truthy())),
        Op::Xor => Ok(Value::from(left.truthy() ^ right.truthy())),
        Op::Not | Op::Neg | Op::Pos => Err(VmError::bad(
            "expression",
            format!("operator {} takes one operand", op.symbol()),
        )),
    }
}

fn cmp(left: &Value, right: &Value, pred: impl Fn(Ordering) -> bool) -> Value {
    Value::from(pred(compare_values(left, right)))
}
