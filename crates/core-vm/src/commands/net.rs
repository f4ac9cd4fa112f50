//! Per-VM outbound channel: CONNECT / DISCONNECT, delegated to the network
//! collaborator.

use core_host::StoreError;

use crate::error::VmError;
use crate::registry::{int_at, text_at, CommandDef, Param, ParamKind};
use crate::vm::Vm;

pub(crate) static DEFS: &[CommandDef] = &[
    CommandDef {
        name: "CONNECT",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Value, ParamKind::Value],
        handler: connect_cmd,
    },
    CommandDef {
        name: "DISCONNECT",
        min: 0,
        max: 0,
        kinds: &[],
        handler: disconnect_cmd,
    },
];

fn net_host(vm: &Vm, command: &str) -> Result<std::sync::Arc<dyn core_host::NetHost>, VmError> {
    vm.net
        .clone()
        .ok_or_else(|| StoreError::Unavailable(format!("{command}: no network host attached")).into())
}

fn connect_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let host = text_at("CONNECT", params, 0)?;
    let port = int_at("CONNECT", params, 1)?;
    if !(1..=65535).contains(&port) {
        return Err(VmError::bad("CONNECT", format!("port {port} out of range")));
    }
    net_host(vm, "CONNECT")?.connect(&host, port as u16)?;
    Ok(())
}

fn disconnect_cmd(vm: &mut Vm, _params: &[Param]) -> Result<(), VmError> {
    net_host(vm, "DISCONNECT")?.disconnect()?;
    Ok(())
}
