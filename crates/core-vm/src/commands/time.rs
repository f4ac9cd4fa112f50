//! Datetime commands. Format codes are the script language's own
//! (`YYYY YY MM DD HH mm ss`), translated to strftime at the boundary.
//! Datetimes move between commands as `YYYY-MM-DD HH:mm:ss` strings.

use std::time::Instant;

use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::commands::{write_num, write_text};
use crate::error::VmError;
use crate::registry::{opt_text_at, text_at, var_at, CommandDef, Param, ParamKind};
use crate::vm::Vm;

const WIRE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) static DEFS: &[CommandDef] = &[
    CommandDef {
        name: "GETDATE",
        min: 1,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: get_date_cmd,
    },
    CommandDef {
        name: "GETDATETIME",
        min: 1,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: get_date_time_cmd,
    },
    CommandDef {
        name: "DATETIMEDIFF",
        min: 3,
        max: 4,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value, ParamKind::Value],
        handler: date_time_diff_cmd,
    },
    CommandDef {
        name: "DATETIMETOSTR",
        min: 3,
        max: 3,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: date_time_to_str_cmd,
    },
    CommandDef {
        name: "STARTTIMER",
        min: 0,
        max: 0,
        kinds: &[],
        handler: start_timer_cmd,
    },
    CommandDef {
        name: "STOPTIMER",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Var],
        handler: stop_timer_cmd,
    },
];

/// Translate `YYYY YY MM DD HH mm ss` codes into a strftime format. Longest
/// codes first so `YYYY` never decays into two `%y`.
fn translate_format(codes: &str) -> String {
    const TABLE: &[(&str, &str)] = &[
        ("YYYY", "%Y"),
        ("YY", "%y"),
        ("MM", "%m"),
        ("DD", "%d"),
        ("HH", "%H"),
        ("mm", "%M"),
        ("ss", "%S"),
    ];
    let mut out = String::with_capacity(codes.len());
    let chars: Vec<char> = codes.chars().collect();
    let mut i = 0;
    'outer: while i < chars.len() {
        for (code, fmt) in TABLE {
            let code_chars: Vec<char> = code.chars().collect();
            if chars[i..].starts_with(&code_chars[..]) {
                out.push_str(fmt);
                i += code_chars.len();
                continue 'outer;
            }
        }
        if chars[i] == '%' {
            out.push_str("%%");
        } else {
            out.push(chars[i]);
        }
        i += 1;
    }
    out
}

fn parse_date_time(command: &str, text: &str) -> Result<NaiveDateTime, VmError> {
    let trimmed = text.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, WIRE_FORMAT) {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }
    Err(VmError::bad(command, format!("cannot parse datetime {trimmed:?}")))
}

fn get_date_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("GETDATE", params, 0)?.to_string();
    let codes = opt_text_at("GETDATE", params, 1)?.unwrap_or_else(|| "MM/DD/YYYY".to_string());
    let text = Local::now().format(&translate_format(&codes)).to_string();
    write_text(vm, &var, text)
}

fn get_date_time_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("GETDATETIME", params, 0)?.to_string();
    let codes =
        opt_text_at("GETDATETIME", params, 1)?.unwrap_or_else(|| "YYYY-MM-DD HH:mm:ss".to_string());
    let text = Local::now().format(&translate_format(&codes)).to_string();
    write_text(vm, &var, text)
}

/// Difference `later - earlier` in the requested unit (seconds by default).
fn date_time_diff_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("DATETIMEDIFF", params, 0)?.to_string();
    let earlier = parse_date_time("DATETIMEDIFF", &text_at("DATETIMEDIFF", params, 1)?)?;
    let later = parse_date_time("DATETIMEDIFF", &text_at("DATETIMEDIFF", params, 2)?)?;
    let unit = opt_text_at("DATETIMEDIFF", params, 3)?
        .unwrap_or_else(|| "SECONDS".to_string())
        .to_ascii_uppercase();
    let seconds = (later - earlier).num_seconds() as f64;
    let value = match unit.as_str() {
        "SECONDS" | "SECOND" | "S" => seconds,
        "MINUTES" | "MINUTE" | "M" => seconds / 60.0,
        "HOURS" | "HOUR" | "H" => seconds / 3600.0,
        "DAYS" | "DAY" | "D" => seconds / 86400.0,
        other => return Err(VmError::bad("DATETIMEDIFF", format!("unknown unit {other:?}"))),
    };
    write_num(vm, &var, value.trunc())
}

fn date_time_to_str_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("DATETIMETOSTR", params, 0)?.to_string();
    let datetime = parse_date_time("DATETIMETOSTR", &text_at("DATETIMETOSTR", params, 1)?)?;
    let codes = text_at("DATETIMETOSTR", params, 2)?;
    let text = datetime.format(&translate_format(&codes)).to_string();
    write_text(vm, &var, text)
}

fn start_timer_cmd(vm: &mut Vm, _params: &[Param]) -> Result<(), VmError> {
    vm.timer = Some(Instant::now());
    Ok(())
}

/// Elapsed whole seconds since `STARTTIMER`; 0 when no timer is running.
fn stop_timer_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("STOPTIMER", params, 0)?.to_string();
    let elapsed = vm
        .timer
        .take()
        .map(|started| started.elapsed().as_secs() as f64)
        .unwrap_or(0.0);
    write_num(vm, &var, elapsed)
}
