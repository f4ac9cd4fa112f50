//! Comparison commands: the result variable receives 1 or 0. Comparison is
//! numeric when both sides parse as numbers, lexicographic otherwise.

use std::cmp::Ordering;

use core_value::compare_values;

use crate::commands::write_bool;
use crate::error::VmError;
use crate::registry::{value_at, var_at, CommandDef, Param, ParamKind};
use crate::vm::Vm;

pub(crate) static DEFS: &[CommandDef] = &[
    CommandDef {
        name: "ISEQUAL",
        min: 3,
        max: 3,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: is_equal_cmd,
    },
    CommandDef {
        name: "ISNOTEQUAL",
        min: 3,
        max: 3,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: is_not_equal_cmd,
    },
    CommandDef {
        name: "ISGREATER",
        min: 3,
        max: 3,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: is_greater_cmd,
    },
    CommandDef {
        name: "ISLESS",
        min: 3,
        max: 3,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: is_less_cmd,
    },
    CommandDef {
        name: "ISGREATEREQUAL",
        min: 3,
        max: 3,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: is_greater_equal_cmd,
    },
    CommandDef {
        name: "ISLESSEQUAL",
        min: 3,
        max: 3,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: is_less_equal_cmd,
    },
];

fn compare(
    vm: &mut Vm,
    command: &str,
    params: &[Param],
    pred: impl Fn(Ordering) -> bool,
) -> Result<(), VmError> {
    let var = var_at(command, params, 0)?.to_string();
    let a = value_at(command, params, 1)?;
    let b = value_at(command, params, 2)?;
    let result = pred(compare_values(a, b));
    write_bool(vm, &var, result)
}

fn is_equal_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    compare(vm, "ISEQUAL", params, |o| o == Ordering::Equal)
}

fn is_not_equal_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    compare(vm, "ISNOTEQUAL", params, |o| o != Ordering::Equal)
}

fn is_greater_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    compare(vm, "ISGREATER", params, |o| o == Ordering::Greater)
}

fn is_less_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    compare(vm, "ISLESS", params, |o| o == Ordering::Less)
}

fn is_greater_equal_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    compare(vm, "ISGREATEREQUAL", params, |o| o != Ordering::Less)
}

fn is_less_equal_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    compare(vm, "ISLESSEQUAL", params, |o| o != Ordering::Greater)
}
