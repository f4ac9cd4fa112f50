//! Math commands. The arithmetic family mutates its first argument in place;
//! trig works in degrees.

use rand::Rng;

use crate::commands::write_num;
use crate::error::VmError;
use crate::registry::{int_at, num_at, var_at, CommandDef, Param, ParamKind};
use crate::vm::Vm;

pub(crate) static DEFS: &[CommandDef] = &[
    CommandDef {
        name: "ADD",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: add_cmd,
    },
    CommandDef {
        name: "SUBTRACT",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: subtract_cmd,
    },
    CommandDef {
        name: "MULTIPLY",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: multiply_cmd,
    },
    CommandDef {
        name: "DIVIDE",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: divide_cmd,
    },
    CommandDef {
        name: "MOD",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: mod_cmd,
    },
    CommandDef {
        name: "RANDOM",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: random_cmd,
    },
    CommandDef {
        name: "ABS",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Var],
        handler: abs_cmd,
    },
    CommandDef {
        name: "INT",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Var],
        handler: int_cmd,
    },
    CommandDef {
        name: "ROUND",
        min: 1,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: round_cmd,
    },
    CommandDef {
        name: "SQR",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Var],
        handler: sqr_cmd,
    },
    CommandDef {
        name: "POWER",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: power_cmd,
    },
    CommandDef {
        name: "SIN",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Var],
        handler: sin_cmd,
    },
    CommandDef {
        name: "COS",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Var],
        handler: cos_cmd,
    },
    CommandDef {
        name: "TAN",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Var],
        handler: tan_cmd,
    },
];

fn update_num(
    vm: &mut Vm,
    command: &str,
    params: &[Param],
    f: impl Fn(f64) -> Result<f64, VmError>,
) -> Result<(), VmError> {
    let var = var_at(command, params, 0)?.to_string();
    let current = vm.read_var_name(&var).number_lossy();
    write_num(vm, &var, f(current)?)
}

fn add_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let operand = num_at("ADD", params, 1)?;
    update_num(vm, "ADD", params, |n| Ok(n + operand))
}

fn subtract_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let operand = num_at("SUBTRACT", params, 1)?;
    update_num(vm, "SUBTRACT", params, |n| Ok(n - operand))
}

fn multiply_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let operand = num_at("MULTIPLY", params, 1)?;
    update_num(vm, "MULTIPLY", params, |n| Ok(n * operand))
}

fn divide_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let operand = num_at("DIVIDE", params, 1)?;
    update_num(vm, "DIVIDE", params, |n| {
        if operand == 0.0 {
            Err(VmError::DivisionByZero)
        } else {
            Ok(n / operand)
        }
    })
}

fn mod_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let operand = num_at("MOD", params, 1)?;
    update_num(vm, "MOD", params, |n| {
        if operand == 0.0 {
            Err(VmError::DivisionByZero)
        } else {
            Ok(n % operand)
        }
    })
}

/// `RANDOM $v max` stores an integer in `[0, max)`.
fn random_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("RANDOM", params, 0)?.to_string();
    let max = int_at("RANDOM", params, 1)?;
    let value = if max > 0 {
        rand::thread_rng().gen_range(0..max)
    } else {
        0
    };
    write_num(vm, &var, value as f64)
}

fn abs_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    update_num(vm, "ABS", params, |n| Ok(n.abs()))
}

fn int_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    update_num(vm, "INT", params, |n| Ok(n.trunc()))
}

fn round_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let digits = if params.len() > 1 {
        int_at("ROUND", params, 1)?.clamp(0, 12)
    } else {
        0
    };
    let scale = 10f64.powi(digits as i32);
    update_num(vm, "ROUND", params, |n| Ok((n * scale).round() / scale))
}

fn sqr_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    update_num(vm, "SQR", params, |n| {
        if n < 0.0 {
            Err(VmError::bad("SQR", "square root of a negative number"))
        } else {
            Ok(n.sqrt())
        }
    })
}

fn power_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let exponent = num_at("POWER", params, 1)?;
    update_num(vm, "POWER", params, |n| Ok(n.powf(exponent)))
}

fn sin_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    update_num(vm, "SIN", params, |n| Ok(n.to_radians().sin()))
}

fn cos_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    update_num(vm, "COS", params, |n| Ok(n.to_radians().cos()))
}

fn tan_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    update_num(vm, "TAN", params, |n| Ok(n.to_radians().tan()))
}
