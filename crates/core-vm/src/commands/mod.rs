//! Command implementations, one module per family. Each module exports a
//! static `DEFS` table; the registry chains them all.

use core_value::Value;

use crate::error::VmError;
use crate::registry::CommandDef;
use crate::vm::Vm;

pub(crate) mod compare;
pub(crate) mod control;
pub(crate) mod game;
pub(crate) mod io;
pub(crate) mod math;
pub(crate) mod menu;
pub(crate) mod net;
pub(crate) mod text;
pub(crate) mod time;
pub(crate) mod trigger;
pub(crate) mod vars;

pub(crate) fn all() -> impl Iterator<Item = &'static CommandDef> {
    control::DEFS
        .iter()
        .chain(io::DEFS)
        .chain(vars::DEFS)
        .chain(text::DEFS)
        .chain(math::DEFS)
        .chain(compare::DEFS)
        .chain(time::DEFS)
        .chain(trigger::DEFS)
        .chain(net::DEFS)
        .chain(menu::DEFS)
        .chain(game::DEFS)
}

pub(crate) fn write_num(vm: &mut Vm, name: &str, value: f64) -> Result<(), VmError> {
    vm.write_var_name(name, &Value::Num(value))
}

pub(crate) fn write_text(vm: &mut Vm, name: &str, value: String) -> Result<(), VmError> {
    vm.write_var_name(name, &Value::Str(value))
}

pub(crate) fn write_bool(vm: &mut Vm, name: &str, value: bool) -> Result<(), VmError> {
    vm.write_var_name(name, &Value::from(value))
}
