//! I/O commands: sending to the remote, local display, suspension on input.

use core_value::Value;

use crate::error::VmError;
use crate::registry::{opt_text_at, text_at, value_at, var_at, CommandDef, Param, ParamKind};
use crate::state::VmState;
use crate::vm::Vm;

pub(crate) static DEFS: &[CommandDef] = &[
    CommandDef {
        name: "SEND",
        min: 1,
        max: -1,
        kinds: &[ParamKind::Value],
        handler: send_cmd,
    },
    CommandDef {
        name: "ECHO",
        min: 1,
        max: -1,
        kinds: &[ParamKind::Value],
        handler: echo_cmd,
    },
    CommandDef {
        name: "CLIENTMESSAGE",
        min: 1,
        max: -1,
        kinds: &[ParamKind::Value],
        handler: client_message_cmd,
    },
    CommandDef {
        name: "CLEARTEXT",
        min: 0,
        max: 0,
        kinds: &[],
        handler: clear_text_cmd,
    },
    CommandDef {
        name: "DISPLAYTEXT",
        min: 1,
        max: -1,
        kinds: &[ParamKind::Value],
        handler: display_text_cmd,
    },
    CommandDef {
        name: "WAITFOR",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Value],
        handler: waitfor_cmd,
    },
    CommandDef {
        name: "GETINPUT",
        min: 2,
        max: 3,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: get_input_cmd,
    },
    CommandDef {
        name: "GETCONSOLEINPUT",
        min: 1,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: get_console_input_cmd,
    },
    CommandDef {
        name: "LOGGING",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Value],
        handler: logging_cmd,
    },
];

fn concat_args(command: &str, params: &[Param]) -> Result<String, VmError> {
    let mut out = String::new();
    for i in 0..params.len() {
        out.push_str(&text_at(command, params, i)?);
    }
    Ok(out)
}

/// `SEND` preserves embedded carriage returns verbatim. A `*` is the script
/// idiom for ENTER and becomes a carriage return on the wire.
fn send_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let text = concat_args("SEND", params)?;
    vm.send(&text.replace('*', "\r"));
    Ok(())
}

/// `ECHO` converts bare `\r` into `\r\n` for local display.
fn echo_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let text = concat_args("ECHO", params)?;
    vm.echo_out(&text.replace("\r\n", "\r").replace('\r', "\r\n"));
    Ok(())
}

fn client_message_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let text = concat_args("CLIENTMESSAGE", params)?;
    vm.output(&format!("{text}\r\n"));
    Ok(())
}

fn clear_text_cmd(vm: &mut Vm, _params: &[Param]) -> Result<(), VmError> {
    if let Ok(mut consts) = vm.consts.write() {
        consts.clear_current_line();
    }
    Ok(())
}

fn display_text_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let text = concat_args("DISPLAYTEXT", params)?;
    vm.echo_out(&text);
    Ok(())
}

fn waitfor_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let text = text_at("WAITFOR", params, 0)?;
    vm.state = VmState::Waiting(text);
    Ok(())
}

fn get_input_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let prompt = text_at("GETINPUT", params, 1)?;
    let default = opt_text_at("GETINPUT", params, 2)?;
    suspend_for_input(vm, params, "GETINPUT", &prompt, default)
}

fn get_console_input_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let prompt = opt_text_at("GETCONSOLEINPUT", params, 1)?.unwrap_or_default();
    suspend_for_input(vm, params, "GETCONSOLEINPUT", &prompt, None)
}

/// First execution: show the prompt and pause awaiting input. Re-execution
/// after `resume_with_input`: consume the pending input (or the default),
/// store it, and fall through.
fn suspend_for_input(
    vm: &mut Vm,
    params: &[Param],
    command: &str,
    prompt: &str,
    default: Option<String>,
) -> Result<(), VmError> {
    let var = var_at(command, params, 0)?;
    if vm.just_resumed {
        let input = vm.pending_input.take().unwrap_or_default();
        let value = if input.is_empty() {
            default.unwrap_or_default()
        } else {
            input
        };
        let var = var.to_string();
        vm.write_var_name(&var, &Value::Str(value))?;
        vm.just_resumed = false;
        return Ok(());
    }
    let display = match &default {
        Some(d) if !d.is_empty() => format!("{prompt} [{d}]"),
        _ => prompt.to_string(),
    };
    if !display.is_empty() {
        vm.echo_out(&display);
    }
    vm.input_prompt = display;
    vm.waiting_for_input = true;
    Err(VmError::Paused)
}

fn logging_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    vm.logging_inbound = value_at("LOGGING", params, 0)?.truthy();
    Ok(())
}
