//! Control flow: GOTO, GOSUB, RETURN, BRANCH, HALT, PAUSE.

use core_lang::{canonical_label, parse_expression_text};

use crate::error::VmError;
use crate::eval::eval;
use crate::registry::{text_at, CommandDef, Param, ParamKind};
use crate::state::StackFrame;
use crate::vm::Vm;

pub(crate) static DEFS: &[CommandDef] = &[
    CommandDef {
        name: "GOTO",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Value],
        handler: goto_cmd,
    },
    CommandDef {
        name: "GOSUB",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Value],
        handler: gosub_cmd,
    },
    CommandDef {
        name: "RETURN",
        min: 0,
        max: 0,
        kinds: &[],
        handler: return_cmd,
    },
    CommandDef {
        name: "BRANCH",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Value, ParamKind::Value],
        handler: branch_cmd,
    },
    CommandDef {
        name: "HALT",
        min: 0,
        max: 0,
        kinds: &[],
        handler: halt_cmd,
    },
    CommandDef {
        name: "PAUSE",
        min: 0,
        max: 0,
        kinds: &[],
        handler: pause_cmd,
    },
];

fn goto_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let label = text_at("GOTO", params, 0)?;
    vm.jump_to_label(&label);
    Ok(())
}

fn gosub_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let label = text_at("GOSUB", params, 0)?;
    vm.push_frame(StackFrame {
        label: canonical_label(&label),
        saved_position: vm.position(),
        return_address: vm.position() + 1,
    });
    vm.jump_to_label(&label);
    Ok(())
}

fn return_cmd(vm: &mut Vm, _params: &[Param]) -> Result<(), VmError> {
    match vm.pop_frame() {
        Some(frame) => {
            vm.jump_to_position(frame.return_address);
            Ok(())
        }
        // Inside a trigger handler an unmatched RETURN ends the handler;
        // anywhere else it is a script bug.
        None if vm.in_handler() => Err(VmError::HandlerReturn),
        None => Err(VmError::ReturnWithoutGosub),
    }
}

/// The primitive every IF/WHILE expansion targets: evaluate the string-form
/// expression and jump unless its numeric form is exactly 1.
fn branch_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let condition = text_at("BRANCH", params, 0)?;
    let label = text_at("BRANCH", params, 1)?;
    let expr = parse_expression_text(&condition, "<branch>")?;
    let result = eval(vm, &expr)?;
    if result.number_lossy() != 1.0 {
        vm.jump_to_label(&label);
    }
    Ok(())
}

fn halt_cmd(vm: &mut Vm, _params: &[Param]) -> Result<(), VmError> {
    vm.halt();
    Ok(())
}

fn pause_cmd(_vm: &mut Vm, _params: &[Param]) -> Result<(), VmError> {
    Err(VmError::Paused)
}
