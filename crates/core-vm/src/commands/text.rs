//! Text commands. Positions and indices are 1-based throughout, matching the
//! script language's conventions.

use crate::ansi::strip_ansi;
use crate::commands::{write_num, write_text};
use crate::error::VmError;
use crate::registry::{int_at, opt_text_at, text_at, var_at, CommandDef, Param, ParamKind};
use crate::vm::Vm;

pub(crate) static DEFS: &[CommandDef] = &[
    CommandDef {
        name: "LEN",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: len_cmd,
    },
    CommandDef {
        name: "MID",
        min: 4,
        max: 4,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value, ParamKind::Value],
        handler: mid_cmd,
    },
    CommandDef {
        name: "LEFT",
        min: 3,
        max: 3,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: left_cmd,
    },
    CommandDef {
        name: "RIGHT",
        min: 3,
        max: 3,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: right_cmd,
    },
    CommandDef {
        name: "INSTR",
        min: 3,
        max: 3,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: instr_cmd,
    },
    CommandDef {
        name: "FIND",
        min: 3,
        max: 4,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value, ParamKind::Value],
        handler: find_cmd,
    },
    CommandDef {
        name: "UPPER",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Var],
        handler: upper_cmd,
    },
    CommandDef {
        name: "LOWER",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Var],
        handler: lower_cmd,
    },
    CommandDef {
        name: "TRIM",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Var],
        handler: trim_cmd,
    },
    CommandDef {
        name: "CHR",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: chr_cmd,
    },
    CommandDef {
        name: "ASC",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: asc_cmd,
    },
    CommandDef {
        name: "REPLACE",
        min: 3,
        max: 3,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: replace_cmd,
    },
    CommandDef {
        name: "PADLEFT",
        min: 2,
        max: 3,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: pad_left_cmd,
    },
    CommandDef {
        name: "PADRIGHT",
        min: 2,
        max: 3,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: pad_right_cmd,
    },
    CommandDef {
        name: "CENTER",
        min: 2,
        max: 3,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: center_cmd,
    },
    CommandDef {
        name: "REPEAT",
        min: 3,
        max: 3,
        kinds: &[ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: repeat_cmd,
    },
    CommandDef {
        name: "CUTTEXT",
        min: 4,
        max: 4,
        kinds: &[ParamKind::Value, ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: cut_text_cmd,
    },
    CommandDef {
        name: "GETWORD",
        min: 3,
        max: 4,
        kinds: &[ParamKind::Value, ParamKind::Var, ParamKind::Value, ParamKind::Value],
        handler: get_word_cmd,
    },
    CommandDef {
        name: "GETWORDPOS",
        min: 3,
        max: 3,
        kinds: &[ParamKind::Value, ParamKind::Var, ParamKind::Value],
        handler: get_word_pos_cmd,
    },
    CommandDef {
        name: "NUMWORDS",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Value, ParamKind::Var],
        handler: num_words_cmd,
    },
    CommandDef {
        name: "STRIPTEXT",
        min: 2,
        max: 2,
        kinds: &[ParamKind::Var, ParamKind::Value],
        handler: strip_text_cmd,
    },
    CommandDef {
        name: "STRIPANSI",
        min: 1,
        max: 1,
        kinds: &[ParamKind::Var],
        handler: strip_ansi_cmd,
    },
    CommandDef {
        name: "MERGETEXT",
        min: 3,
        max: 3,
        kinds: &[ParamKind::Value, ParamKind::Value, ParamKind::Var],
        handler: merge_text_cmd,
    },
];

/// 1-based character slice, clamped to the text.
fn slice_chars(text: &str, start: i64, len: i64) -> String {
    if start < 1 || len < 1 {
        return String::new();
    }
    text.chars()
        .skip(start as usize - 1)
        .take(len as usize)
        .collect()
}

fn len_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("LEN", params, 0)?.to_string();
    let text = text_at("LEN", params, 1)?;
    write_num(vm, &var, text.chars().count() as f64)
}

fn mid_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("MID", params, 0)?.to_string();
    let text = text_at("MID", params, 1)?;
    let start = int_at("MID", params, 2)?;
    let len = int_at("MID", params, 3)?;
    write_text(vm, &var, slice_chars(&text, start, len))
}

fn left_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("LEFT", params, 0)?.to_string();
    let text = text_at("LEFT", params, 1)?;
    let n = int_at("LEFT", params, 2)?;
    write_text(vm, &var, slice_chars(&text, 1, n))
}

fn right_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("RIGHT", params, 0)?.to_string();
    let text = text_at("RIGHT", params, 1)?;
    let n = int_at("RIGHT", params, 2)?;
    let total = text.chars().count() as i64;
    let start = (total - n).max(0) + 1;
    write_text(vm, &var, slice_chars(&text, start, n.max(0)))
}

/// 1-based character position of the first occurrence, 0 when absent.
fn char_position(haystack: &str, needle: &str, from: usize) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let chars: Vec<char> = haystack.chars().collect();
    let needle_chars: Vec<char> = needle.chars().collect();
    if from == 0 || needle_chars.len() > chars.len() {
        return 0;
    }
    for start in (from - 1)..=(chars.len().saturating_sub(needle_chars.len())) {
        if chars[start..start + needle_chars.len()] == needle_chars[..] {
            return start + 1;
        }
    }
    0
}

fn instr_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("INSTR", params, 0)?.to_string();
    let haystack = text_at("INSTR", params, 1)?;
    let needle = text_at("INSTR", params, 2)?;
    write_num(vm, &var, char_position(&haystack, &needle, 1) as f64)
}

fn find_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("FIND", params, 0)?.to_string();
    let haystack = text_at("FIND", params, 1)?;
    let needle = text_at("FIND", params, 2)?;
    let from = if params.len() > 3 {
        int_at("FIND", params, 3)?.max(1) as usize
    } else {
        1
    };
    write_num(vm, &var, char_position(&haystack, &needle, from) as f64)
}

fn transform_in_place(
    vm: &mut Vm,
    command: &str,
    params: &[Param],
    f: impl Fn(String) -> String,
) -> Result<(), VmError> {
    let var = var_at(command, params, 0)?.to_string();
    let current = vm.read_var_name(&var).to_text();
    write_text(vm, &var, f(current))
}

fn upper_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    transform_in_place(vm, "UPPER", params, |s| s.to_uppercase())
}

fn lower_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    transform_in_place(vm, "LOWER", params, |s| s.to_lowercase())
}

fn trim_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    transform_in_place(vm, "TRIM", params, |s| s.trim().to_string())
}

fn chr_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("CHR", params, 0)?.to_string();
    let code = int_at("CHR", params, 1)?;
    if !(0..=255).contains(&code) {
        return Err(VmError::bad("CHR", format!("character code {code} out of range")));
    }
    write_text(vm, &var, (code as u8 as char).to_string())
}

fn asc_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("ASC", params, 0)?.to_string();
    let text = text_at("ASC", params, 1)?;
    let code = text.chars().next().map(|c| c as u32).unwrap_or(0);
    write_num(vm, &var, code as f64)
}

fn replace_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let find = text_at("REPLACE", params, 1)?;
    let replace = text_at("REPLACE", params, 2)?;
    transform_in_place(vm, "REPLACE", params, |s| {
        if find.is_empty() {
            s
        } else {
            s.replace(&find, &replace)
        }
    })
}

fn pad_char(command: &str, params: &[Param], i: usize) -> Result<char, VmError> {
    Ok(opt_text_at(command, params, i)?
        .and_then(|s| s.chars().next())
        .unwrap_or(' '))
}

fn pad_left_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let width = int_at("PADLEFT", params, 1)?.max(0) as usize;
    let fill = pad_char("PADLEFT", params, 2)?;
    transform_in_place(vm, "PADLEFT", params, |s| {
        let have = s.chars().count();
        if have >= width {
            s
        } else {
            let mut out: String = std::iter::repeat(fill).take(width - have).collect();
            out.push_str(&s);
            out
        }
    })
}

fn pad_right_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let width = int_at("PADRIGHT", params, 1)?.max(0) as usize;
    let fill = pad_char("PADRIGHT", params, 2)?;
    transform_in_place(vm, "PADRIGHT", params, |s| {
        let have = s.chars().count();
        let mut out = s;
        out.extend(std::iter::repeat(fill).take(width.saturating_sub(have)));
        out
    })
}

fn center_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let width = int_at("CENTER", params, 1)?.max(0) as usize;
    let fill = pad_char("CENTER", params, 2)?;
    transform_in_place(vm, "CENTER", params, |s| {
        let have = s.chars().count();
        if have >= width {
            return s;
        }
        let total = width - have;
        let left = total / 2;
        let mut out: String = std::iter::repeat(fill).take(left).collect();
        out.push_str(&s);
        out.extend(std::iter::repeat(fill).take(total - left));
        out
    })
}

fn repeat_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let var = var_at("REPEAT", params, 0)?.to_string();
    let text = text_at("REPEAT", params, 1)?;
    let count = int_at("REPEAT", params, 2)?.max(0) as usize;
    write_text(vm, &var, text.repeat(count))
}

/// TWX-ordered: source, destination variable, 1-based start, length. A start
/// beyond the end of the line is an error, unlike `MID` which clamps.
fn cut_text_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let text = text_at("CUTTEXT", params, 0)?;
    let var = var_at("CUTTEXT", params, 1)?.to_string();
    let start = int_at("CUTTEXT", params, 2)?;
    let len = int_at("CUTTEXT", params, 3)?;
    let total = text.chars().count() as i64;
    if start < 1 || start > total {
        return Err(VmError::bad(
            "CUTTEXT",
            format!("start {start} beyond end of line (length {total})"),
        ));
    }
    write_text(vm, &var, slice_chars(&text, start, len))
}

fn words(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

fn get_word_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let line = text_at("GETWORD", params, 0)?;
    let var = var_at("GETWORD", params, 1)?.to_string();
    let index = int_at("GETWORD", params, 2)?;
    let default = opt_text_at("GETWORD", params, 3)?.unwrap_or_else(|| "0".to_string());
    let word = if index >= 1 {
        words(&line).get(index as usize - 1).map(|w| w.to_string())
    } else {
        None
    };
    write_text(vm, &var, word.unwrap_or(default))
}

fn get_word_pos_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let line = text_at("GETWORDPOS", params, 0)?;
    let var = var_at("GETWORDPOS", params, 1)?.to_string();
    let word = text_at("GETWORDPOS", params, 2)?;
    write_num(vm, &var, char_position(&line, &word, 1) as f64)
}

fn num_words_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let line = text_at("NUMWORDS", params, 0)?;
    let var = var_at("NUMWORDS", params, 1)?.to_string();
    write_num(vm, &var, words(&line).len() as f64)
}

fn strip_text_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let remove = text_at("STRIPTEXT", params, 1)?;
    transform_in_place(vm, "STRIPTEXT", params, |s| {
        if remove.is_empty() {
            s
        } else {
            s.replace(&remove, "")
        }
    })
}

fn strip_ansi_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    transform_in_place(vm, "STRIPANSI", params, |s| strip_ansi(&s))
}

fn merge_text_cmd(vm: &mut Vm, params: &[Param]) -> Result<(), VmError> {
    let a = text_at("MERGETEXT", params, 0)?;
    let b = text_at("MERGETEXT", params, 1)?;
    let var = var_at("MERGETEXT", params, 2)?.to_string();
    write_text(vm, &var, format!("{a}{b}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_is_one_based_and_clamped() {
        assert_eq!(slice_chars("abcdef", 2, 3), "bcd");
        assert_eq!(slice_chars("abcdef", 5, 10), "ef");
        assert_eq!(slice_chars("abcdef", 0, 3), "");
        assert_eq!(slice_chars("abcdef", 7, 1), "");
    }

    #[test]
    fn char_positions_are_one_based() {
        assert_eq!(char_position("hello world", "world", 1), 7);
        assert_eq!(char_position("hello", "x", 1), 0);
        assert_eq!(char_position("aXaX", "X", 3), 4);
        assert_eq!(char_position("abc", "", 1), 0);
    }
}
