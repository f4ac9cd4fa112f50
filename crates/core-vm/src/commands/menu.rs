//! Terminal-menu commands, delegated method-for-method to the menu
//! collaborator.

use std::sync::Arc;

use core_host::{MenuHost, StoreError};

use crate::commands::write_text;
use crate::error::VmError;
use crate::registry::{opt_text_at, text_at, var_at, CommandDef, Param, ParamKind};
use crate::vm::Vm;

pub(crate) static DEFS: &[CommandDef] = &[
    CommandDef {
        name: "ADDMENU",
        min: 4,
        max: 6,
        kinds: &[
            ParamKind::Value,
            ParamKind::Value,
            ParamKind::Value,
            ParamKind::Value,
            ParamKind::Value,
            ParamKind::Value,
        ],
        handler: add_menu_cmd,
    },
    CommandDef {
        name: "OPENMENU",
        min: 1,
        max: 2,
        kinds: &[ParamKind::Value, ParamKind::Value],
        handler: open_menu_cmd,
    },
    CommandDef {
        name: "CLOSEMENU",
        min: 0,
        max: 0,
        kinds: &[],
        handler: close_menu_cmd,
    },
    CommandDef {
        name: "GETMENUVALUE",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: get_menu_value_cmd,
    },
    CommandDef {
        name: "SETMENUVALUE",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Value, ParamKind::Value],
        handler: set_menu_value_cmd,
    },
    CommandDef {
        name: "SETMENUHELP",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Value, ParamKind::Value],
        handler: set_menu_help_cmd,
    },
    CommandDef {
        name: "SETMENUOPTIONS",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Value, ParamKind::Value],
        handler: set_menu_options_cmd,
    },
    CommandDef {
        name: "SETMENUKEY",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Value, ParamKind::Value],
        handler: set_menu_key_cmd,
    },
];

fn menus(vm: &Vm, command: &str) -> Result<Arc<dyn MenuHost>, VmError> {
    vm.menus
        .clone()
        .ok_or_else(|| StoreError::Unavailable(format!("{command}: no menu host attached")).into())
}

fn add_menu_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let parent = text_at("ADDMENU", params, 0)?;
    let name = text_at("ADDMENU", params, 1)?;
    let description = text_at("ADDMENU", params, 2)?;
    let hotkey = text_at("ADDMENU", params, 3)?;
    let label = opt_text_at("ADDMENU", params, 4)?.unwrap_or_default();
    let prompt = opt_text_at("ADDMENU", params, 5)?.unwrap_or_default();
    menus(vm, "ADDMENU")?.add_menu(&parent, &name, &description, &hotkey, &label, &prompt)?;
    Ok(())
}

fn open_menu_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let name = text_at("OPENMENU", params, 0)?;
    let prompt = opt_text_at("OPENMENU", params, 1)?.unwrap_or_default();
    menus(vm, "OPENMENU")?.open_menu(&name, &prompt)?;
    Ok(())
}

fn close_menu_cmd(vm: &mut Vm, _params: &[Param]) -> Result<(), VmError> {
    menus(vm, "CLOSEMENU")?.close_menu()?;
    Ok(())
}

fn get_menu_value_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("GETMENUVALUE", params, 0)?.to_string();
    let name = text_at("GETMENUVALUE", params, 1)?;
    let value = menus(vm, "GETMENUVALUE")?.get_menu_value(&name)?;
    write_text(vm, &var, value)
}

fn set_menu_value_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let name = text_at("SETMENUVALUE", params, 0)?;
    let value = text_at("SETMENUVALUE", params, 1)?;
    menus(vm, "SETMENUVALUE")?.set_menu_value(&name, &value)?;
    Ok(())
}

fn set_menu_help_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let name = text_at("SETMENUHELP", params, 0)?;
    let help = text_at("SETMENUHELP", params, 1)?;
    menus(vm, "SETMENUHELP")?.set_menu_help(&name, &help)?;
    Ok(())
}

fn set_menu_options_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let name = text_at("SETMENUOPTIONS", params, 0)?;
    let options = text_at("SETMENUOPTIONS", params, 1)?;
    menus(vm, "SETMENUOPTIONS")?.set_menu_options(&name, &options)?;
    Ok(())
}

fn set_menu_key_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let name = text_at("SETMENUKEY", params, 0)?;
    let key = text_at("SETMENUKEY", params, 1)?;
    menus(vm, "SETMENUKEY")?.set_menu_key(&name, &key)?;
    Ok(())
}
