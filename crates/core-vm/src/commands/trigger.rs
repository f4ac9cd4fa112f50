//! Trigger registration commands. Ids are caller-supplied strings; the
//! legacy `SETTRIGGER` form draws from the VM's monotonic counter instead.
//! All registered triggers are one-shot, the classic behavior that handlers
//! re-register themselves around.

use std::time::{Duration, Instant};

use crate::error::VmError;
use crate::registry::{num_at, opt_text_at, text_at, CommandDef, Param, ParamKind};
use crate::triggers::{Trigger, TriggerKind};
use crate::vm::Vm;

pub(crate) static DEFS: &[CommandDef] = &[
    CommandDef {
        name: "SETTEXTTRIGGER",
        min: 3,
        max: 4,
        kinds: &[ParamKind::Value, ParamKind::Value, ParamKind::Value, ParamKind::Value],
        handler: set_text_trigger_cmd,
    },
    CommandDef {
        name: "SETTEXTLINETRIGGER",
        min: 3,
        max: 4,
        kinds: &[ParamKind::Value, ParamKind::Value, ParamKind::Value, ParamKind::Value],
        handler: set_text_line_trigger_cmd,
    },
    CommandDef {
        name: "SETTEXTOUTTRIGGER",
        min: 3,
        max: 4,
        kinds: &[ParamKind::Value, ParamKind::Value, ParamKind::Value, ParamKind::Value],
        handler: set_text_out_trigger_cmd,
    },
    CommandDef {
        name: "SETDELAYTRIGGER",
        min: 3,
        max: 3,
        kinds: &[ParamKind::Value, ParamKind::Value, ParamKind::Value],
        handler: set_delay_trigger_cmd,
    },
    CommandDef {
        name: "SETEVENTTRIGGER",
        min: 3,
        max: 3,
        kinds: &[ParamKind::Value, ParamKind::Value, ParamKind::Value],
        handler: set_event_trigger_cmd,
    },
    CommandDef {
        name: "KILLTRIGGER",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Value],
        handler: kill_trigger_cmd,
    },
    CommandDef {
        name: "KILLALLTRIGGERS",
        min: 0,
        max: 0,
        kinds: &[],
        handler: kill_all_triggers_cmd,
    },
    CommandDef {
        name: "SETTRIGGER",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Value, ParamKind::Value],
        handler: set_trigger_cmd,
    },
];

fn set_text_kind(vm: &mut Vm, command: &str, params: &[Param], kind: TriggerKind) -> Result<(), VmError> {
    let id = text_at(command, params, 0)?;
    let label = text_at(command, params, 1)?;
    let pattern = text_at(command, params, 2)?;
    let response = opt_text_at(command, params, 3)?.unwrap_or_default();
    vm.triggers.add(
        Trigger::new(&id, kind, &label, &pattern)
            .one_shot()
            .with_response(&response),
    );
    Ok(())
}

fn set_text_trigger_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    set_text_kind(vm, "SETTEXTTRIGGER", params, TriggerKind::Text)
}

fn set_text_line_trigger_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    set_text_kind(vm, "SETTEXTLINETRIGGER", params, TriggerKind::TextLine)
}

fn set_text_out_trigger_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    set_text_kind(vm, "SETTEXTOUTTRIGGER", params, TriggerKind::TextOut)
}

fn set_delay_trigger_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let id = text_at("SETDELAYTRIGGER", params, 0)?;
    let label = text_at("SETDELAYTRIGGER", params, 1)?;
    let millis = num_at("SETDELAYTRIGGER", params, 2)?;
    if millis < 0.0 {
        return Err(VmError::bad("SETDELAYTRIGGER", "negative delay"));
    }
    vm.triggers.add(Trigger::delay(
        &id,
        &label,
        Duration::from_millis(millis as u64),
        Instant::now(),
    ));
    Ok(())
}

fn set_event_trigger_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let id = text_at("SETEVENTTRIGGER", params, 0)?;
    let label = text_at("SETEVENTTRIGGER", params, 1)?;
    let event = text_at("SETEVENTTRIGGER", params, 2)?;
    vm.triggers.add(Trigger::event(&id, &label, &event));
    Ok(())
}

fn kill_trigger_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let id = text_at("KILLTRIGGER", params, 0)?;
    vm.triggers.remove(&id);
    Ok(())
}

fn kill_all_triggers_cmd(vm: &mut Vm, _params: &[Param]) -> Result<(), VmError> {
    vm.triggers.clear();
    Ok(())
}

/// Legacy form: `SETTRIGGER label pattern` with an auto-generated id.
fn set_trigger_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let label = text_at("SETTRIGGER", params, 0)?;
    let pattern = text_at("SETTRIGGER", params, 1)?;
    let id = vm.next_auto_trigger_id();
    vm.triggers
        .add(Trigger::new(&id, TriggerKind::Text, &label, &pattern).one_shot());
    Ok(())
}
