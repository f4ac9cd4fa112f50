//! Variable commands: SETVAR, ISNUM, VAL, STR, SAVEVAR, LOADVAR, SETARRAY.

use core_host::StoreError;
use core_value::Value;

use crate::commands::{write_bool, write_text};
use crate::error::VmError;
use crate::registry::{int_at, text_at, value_at, var_at, CommandDef, Param, ParamKind};
use crate::vm::Vm;

pub(crate) static DEFS: &[CommandDef] = &[
    CommandDef {
        name: "SETVAR",
        min: 2,
        max: -1,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: set_var_cmd,
    },
    CommandDef {
        name: "ISNUM",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: is_num_cmd,
    },
    CommandDef {
        name: "VAL",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: val_cmd,
    },
    CommandDef {
        name: "STR",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: str_cmd,
    },
    CommandDef {
        name: "SAVEVAR",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Var],
        handler: save_var_cmd,
    },
    CommandDef {
        name: "LOADVAR",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Var],
        handler: load_var_cmd,
    },
    CommandDef {
        name: "SETARRAY",
        min: 2,
        max: -1,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: set_array_cmd,
    },
];

/// Multi-argument form concatenates, matching `ECHO`.
fn set_var_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("SETVAR", params, 0)?.to_string();
    let mut out = String::new();
    for i in 1..params.len() {
        out.push_str(&text_at("SETVAR", params, i)?);
    }
    write_text(vm, &var, out)
}

fn is_num_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("ISNUM", params, 0)?.to_string();
    let numeric = value_at("ISNUM", params, 1)?.to_number().is_some();
    write_bool(vm, &var, numeric)
}

/// Leading-numeric parse: `"12abc"` yields 12, non-numeric input yields 0.
fn val_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("VAL", params, 0)?.to_string();
    let text = text_at("VAL", params, 1)?;
    let trimmed = text.trim();
    let mut end = 0;
    for (i, ch) in trimmed.char_indices() {
        let acceptable = ch.is_ascii_digit()
            || (i == 0 && (ch == '-' || ch == '+'))
            || (ch == '.' && !trimmed[..i].contains('.'));
        if acceptable {
            end = i + ch.len_utf8();
        } else {
            break;
        }
    }
    let value = trimmed[..end].parse::<f64>().unwrap_or(0.0);
    vm.write_var_name(&var, &Value::Num(value))
}

fn str_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("STR", params, 0)?.to_string();
    let text = value_at("STR", params, 1)?.to_text();
    write_text(vm, &var, text)
}

fn save_var_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("SAVEVAR", params, 0)?.to_string();
    let value = vm.read_var_name(&var);
    let store = vm
        .store
        .clone()
        .ok_or_else(|| StoreError::Unavailable("no persistent store attached".into()))?;
    store.save_script_variable(&vm.parse_path(&var)?.storage_key(), &value)?;
    Ok(())
}

fn load_var_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("LOADVAR", params, 0)?.to_string();
    let store = vm
        .store
        .clone()
        .ok_or_else(|| StoreError::Unavailable("no persistent store attached".into()))?;
    let key = vm.parse_path(&var)?.storage_key();
    if let Some(value) = store.load_script_variable(&key)? {
        vm.write_var_name(&var, &value)?;
    }
    Ok(())
}

/// Pre-shape a 1-based array so indexed writes never collide with a leaf.
fn set_array_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("SETARRAY", params, 0)?.to_string();
    let mut dims = Vec::with_capacity(params.len() - 1);
    for i in 1..params.len() {
        let dim = int_at("SETARRAY", params, i)?;
        if dim < 1 {
            return Err(VmError::bad("SETARRAY", format!("dimension {dim} out of range")));
        }
        dims.push(dim as usize);
    }
    let path = vm.parse_path(&var)?;
    vm.vars_mut().set_dimensions(&path, &dims);
    Ok(())
}
