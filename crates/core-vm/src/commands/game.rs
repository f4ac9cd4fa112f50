//! Game-data commands. `GETSECTOR` copies one sector's record from the
//! persistent store into a dotted variable subtree.

use core_host::StoreError;
use core_value::Value;

use crate::error::VmError;
use crate::registry::{int_at, var_at, CommandDef, Param, ParamKind};
use crate::vm::Vm;

pub(crate) static DEFS: &[CommandDef] = &[CommandDef {
    name: "GETSECTOR",
    min: 2,
    max: 2,
    kinds: &[ParamKind::Value, ParamKind::Var],
    handler: get_sector_cmd,
}];

fn get_sector_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let index = int_at("GETSECTOR", params, 0)?;
    let var = var_at("GETSECTOR", params, 1)?.to_string();
    // Sector 0 is the "nowhere" sector; asking for it does nothing.
    if index == 0 {
        return Ok(());
    }
    let store = vm
        .store
        .clone()
        .ok_or_else(|| StoreError::Unavailable("no persistent store attached".into()))?;
    let sector = store.load_sector(index)?.unwrap_or_default();
    let port = store.load_port(index)?;
    let base = vm.parse_path(&var)?;

    let mut set = |segs: &[&str], value: Value| {
        let mut path = base.clone();
        for seg in segs {
            if seg.chars().all(|c| c.is_ascii_digit()) {
                path.push_index(seg);
            } else {
                path.push_prop(seg);
            }
        }
        vm.vars.write(&path, &value);
    };

    set(&["INDEX"], Value::Num(index as f64));
    set(&["EXPLORED"], Value::from(sector.explored));
    set(&["CONSTELLATION"], Value::Str(sector.constellation.clone()));
    set(&["BEACON"], Value::Str(sector.beacon.clone()));
    set(&["WARPS"], Value::Num(sector.warp_count() as f64));
    set(&["DENSITY"], Value::Num(sector.density as f64));
    set(&["NAVHAZ"], Value::Num(sector.navhaz as f64));
    set(&["ANOMALY"], Value::from(sector.anomaly));
    set(&["SHIPS"], Value::Num(sector.ships as f64));
    set(&["TRADERS"], Value::Num(sector.traders as f64));
    set(&["PLANETS"], Value::Num(sector.planets as f64));
    for (i, warp) in sector.warps.iter().enumerate() {
        let slot = (i + 1).to_string();
        set(&["WARP", slot.as_str()], Value::Num(*warp as f64));
    }
    match port {
        Some(port) => {
            set(&["PORT", "EXISTS"], Value::Num(1.0));
            set(&["PORT", "NAME"], Value::Str(port.name.clone()));
            set(&["PORT", "CLASS"], Value::Num(port.class_index as f64));
        }
        None => {
            set(&["PORT", "EXISTS"], Value::Num(0.0));
            set(&["PORT", "NAME"], Value::Str(String::new()));
            set(&["PORT", "CLASS"], Value::Num(0.0));
        }
    }
    Ok(())
}
